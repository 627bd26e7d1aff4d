//! contenteditable adapter
//!
//! Presents the `#editor` subtree to the sync engine. Text nodes are text
//! segments, `<br>` is a break, and a `div`/`p` that follows a sibling opens
//! a new line with a break of its own (browsers wrap new lines in blocks).
//! A trailing `<br>` renders nothing, so it counts only when the filler
//! follows it. Node keys are leaf positions in document order, so they only
//! hold until the next mutation.

use std::borrow::Cow;

use mdcollab_sync::text::{char_to_utf16_offset, utf16_to_char_offset};
use mdcollab_sync::{Anchor, EditableDocument, NodeKey, Segment, SegmentSource, Segments};
use wasm_bindgen::JsCast;
use web_sys::{window, Document, Element, HtmlElement, Node};

/// Remote cursor markers live inside the editor and are not content
pub const MARKER_CLASS: &str = "mdcollab-marker";
/// Extra `<br>` that lets a trailing empty line render
const FILLER_CLASS: &str = "mdcollab-filler";

/// Get document helper
pub fn get_document() -> Option<Document> {
    window().and_then(|w| w.document())
}

/// Set connection status indicator (connecting/syncing/synced/disconnected)
pub fn set_status(status: &str) {
    if let Some(doc) = get_document() {
        if let Some(el) = doc.get_element_by_id("status") {
            el.set_text_content(Some(status));
            el.set_class_name(&format!("status-{status}"));
        }
    }
}

#[derive(Debug, Clone)]
pub enum LeafKind {
    Text(String),
    Break,
}

/// One content leaf of the live tree
#[derive(Debug, Clone)]
pub struct Leaf {
    pub node: Node,
    pub kind: LeafKind,
}

fn has_class(el: &Element, class: &str) -> bool {
    el.class_name().split_whitespace().any(|c| c == class)
}

fn tag_is(node: &Node, tags: &[&str]) -> bool {
    node.dyn_ref::<Element>()
        .is_some_and(|el| tags.iter().any(|tag| el.tag_name().eq_ignore_ascii_case(tag)))
}

pub fn is_block(node: &Node) -> bool {
    tag_is(node, &["div", "p"])
}

fn is_content(node: &Node) -> bool {
    match node.node_type() {
        Node::TEXT_NODE => true,
        Node::ELEMENT_NODE => node
            .dyn_ref::<Element>()
            .is_some_and(|el| !has_class(el, MARKER_CLASS)) && !is_filler(node),
        _ => false,
    }
}

fn is_filler(node: &Node) -> bool {
    node.dyn_ref::<Element>().is_some_and(|el| has_class(el, FILLER_CLASS))
}

/// A `<br>` closing a block only keeps the empty block open
///
/// Unless the filler follows it: then it ends a line and the filler renders
/// the empty line after it.
fn is_placeholder_break(node: &Node) -> bool {
    let Some(parent) = node.parent_node() else {
        return false;
    };
    if !is_block(&parent) {
        return false;
    }
    let mut next = node.next_sibling();
    while let Some(sibling) = next {
        if is_content(&sibling) || is_filler(&sibling) {
            return false;
        }
        next = sibling.next_sibling();
    }
    true
}

fn collect(parent: &Node, out: &mut Vec<Leaf>) {
    let children = parent.child_nodes();
    let mut has_previous = false;
    for i in 0..children.length() {
        let Some(child) = children.item(i) else {
            continue;
        };
        if !is_content(&child) {
            continue;
        }
        if child.node_type() == Node::TEXT_NODE {
            let text = child.text_content().unwrap_or_default();
            out.push(Leaf {
                node: child,
                kind: LeafKind::Text(text),
            });
        } else if tag_is(&child, &["br"]) {
            if !is_placeholder_break(&child) {
                out.push(Leaf {
                    node: child,
                    kind: LeafKind::Break,
                });
            }
        } else {
            if has_previous && is_block(&child) {
                out.push(Leaf {
                    node: child.clone(),
                    kind: LeafKind::Break,
                });
            }
            collect(&child, out);
        }
        has_previous = true;
    }
}

/// Content leaves under `root`, or `None` while it is not in the document
pub fn leaves(root: &Node) -> Option<Vec<Leaf>> {
    if !root.is_connected() {
        return None;
    }
    let mut out = Vec::new();
    collect(root, &mut out);
    Some(out)
}

/// (parent, child index) of the point just before `node`
fn position_before(node: &Node) -> Option<(Node, u32)> {
    let parent = node.parent_node()?;
    let children = parent.child_nodes();
    let index = (0..children.length())
        .find(|&i| children.item(i).is_some_and(|child| child.is_same_node(Some(node))))?;
    Some((parent, index))
}

/// Number of leaves before the point (`container`, `offset`)
fn depth_at(leaves: &[Leaf], container: &Node, offset: u32) -> usize {
    let boundary = container.child_nodes().item(offset);
    leaves
        .iter()
        .filter(|leaf| match &boundary {
            Some(boundary) => {
                boundary.compare_document_position(&leaf.node) & Node::DOCUMENT_POSITION_PRECEDING != 0
            }
            None => {
                container.compare_document_position(&leaf.node)
                    & (Node::DOCUMENT_POSITION_PRECEDING | Node::DOCUMENT_POSITION_CONTAINED_BY)
                    != 0
            }
        })
        .count()
}

fn append(root: &HtmlElement, node: &Node) {
    if let Err(e) = root.append_child(node) {
        web_sys::console::error_2(&"[dom] append failed".into(), &e);
    }
}

fn key_of(index: usize) -> NodeKey {
    index as NodeKey
}

/// The live editor
pub struct DomTree {
    root: HtmlElement,
}

impl DomTree {
    pub const fn new(root: HtmlElement) -> Self {
        Self { root }
    }

    pub const fn root(&self) -> &HtmlElement {
        &self.root
    }

    fn leaves(&self) -> Option<Vec<Leaf>> {
        leaves(&self.root)
    }

    /// DOM point for a caret between segments
    fn boundary(&self, leaves: &[Leaf], depth: usize) -> Option<(Node, u32)> {
        match (leaves.get(depth), leaves.last()) {
            (Some(next), _) => position_before(&next.node),
            (None, None) => Some((Node::clone(&self.root), 0)),
            (None, Some(last)) if is_block(&last.node) => Some((last.node.clone(), 0)),
            (None, Some(last)) => position_before(&last.node).map(|(parent, i)| (parent, i + 1)),
        }
    }
}

impl SegmentSource for DomTree {
    fn segments(&self) -> Option<Segments<'_>> {
        let leaves = self.leaves()?;
        Some(Box::new(leaves.into_iter().enumerate().map(|(i, leaf)| {
            let key = key_of(i);
            match leaf.kind {
                LeafKind::Text(text) => Segment::Text {
                    key,
                    text: Cow::Owned(text),
                },
                LeafKind::Break => Segment::Break { key },
            }
        })))
    }
}

impl EditableDocument for DomTree {
    fn caret(&self) -> Option<Anchor> {
        let selection = window()?.get_selection().ok()??;
        let node = selection.anchor_node()?;
        if !self.root.contains(Some(&node)) {
            return None;
        }
        let offset = selection.anchor_offset();
        let leaves = self.leaves()?;

        if node.node_type() == Node::TEXT_NODE {
            let index = leaves.iter().position(|leaf| leaf.node.is_same_node(Some(&node)))?;
            let text = node.text_content().unwrap_or_default();
            return Some(Anchor::Text {
                node: key_of(index),
                offset: utf16_to_char_offset(&text, offset as usize),
            });
        }
        Some(Anchor::Element {
            depth: depth_at(&leaves, &node, offset),
        })
    }

    fn replace_text(&mut self, text: &str) {
        let Some(doc) = get_document() else {
            return;
        };
        let root = &self.root;
        root.set_text_content(None);

        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                if let Ok(br) = doc.create_element("br") {
                    append(root, &br);
                }
            }
            if !line.is_empty() {
                append(root, &doc.create_text_node(line));
            }
        }
        if text.ends_with('\n') {
            if let Ok(filler) = doc.create_element("br") {
                filler.set_class_name(FILLER_CLASS);
                append(root, &filler);
            }
        }
    }

    fn set_caret(&mut self, anchor: Anchor) {
        let Some(leaves) = self.leaves() else {
            return;
        };
        let point = match anchor {
            Anchor::Text { node, offset } => usize::try_from(node)
                .ok()
                .and_then(|i| leaves.get(i))
                .and_then(|leaf| match &leaf.kind {
                    LeafKind::Text(text) => {
                        let unit = char_to_utf16_offset(text, offset);
                        Some((leaf.node.clone(), u32::try_from(unit).ok()?))
                    }
                    LeafKind::Break => None,
                }),
            Anchor::Element { depth } => self.boundary(&leaves, depth),
        };
        let Some((node, offset)) = point else {
            return;
        };
        if let Some(selection) = window().and_then(|w| w.get_selection().ok().flatten()) {
            if let Err(e) = selection.collapse_with_offset(Some(&node), offset) {
                web_sys::console::warn_2(&"[dom] could not place caret".into(), &e);
            }
        }
    }
}
