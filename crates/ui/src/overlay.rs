//! Remote cursor markers painted over the live editor

use mdcollab_sync::text::{char_len, char_to_utf16_offset};
use mdcollab_sync::{Marker, Rect, RenderSurface, RenderedRun, RunPosition};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{window, DomRect, Element, HtmlElement, Node};

use crate::dom::{get_document, is_block, leaves, LeafKind, MARKER_CLASS};

/// The editor as rendered by the browser
pub struct DomSurface<'a> {
    root: &'a HtmlElement,
}

impl<'a> DomSurface<'a> {
    pub const fn new(root: &'a HtmlElement) -> Self {
        Self { root }
    }
}

/// Rectangles of zero size come from positions the browser cannot measure
fn visible(rect: &DomRect) -> Option<Rect> {
    if rect.width() <= 0.0 && rect.height() <= 0.0 {
        return None;
    }
    Some(Rect {
        x: rect.x(),
        y: rect.y(),
        width: rect.width(),
        height: rect.height(),
    })
}

fn element_rect(node: &Node) -> Option<Rect> {
    node.dyn_ref::<Element>()
        .and_then(|el| visible(&el.get_bounding_client_rect()))
}

impl RenderSurface for DomSurface<'_> {
    type Handle = Node;

    fn runs(&self) -> Option<Vec<RenderedRun<Node>>> {
        let runs = leaves(self.root)?
            .into_iter()
            .map(|leaf| match leaf.kind {
                LeafKind::Text(text) => RenderedRun::Text {
                    handle: leaf.node,
                    len: char_len(&text),
                },
                LeafKind::Break => RenderedRun::Break { handle: leaf.node },
            })
            .collect();
        Some(runs)
    }

    fn caret_rect(&self, position: &RunPosition<Node>) -> Option<Rect> {
        let range = get_document()?.create_range().ok()?;
        let placed = match position {
            RunPosition::InText { handle, offset } => {
                let text = handle.text_content().unwrap_or_default();
                let unit = u32::try_from(char_to_utf16_offset(&text, *offset)).ok()?;
                range.set_start(handle, unit)
            }
            RunPosition::BeforeBreak { handle } => range.set_start_before(handle),
            RunPosition::AfterBreak { handle } if is_block(handle) => range.set_start(handle, 0),
            RunPosition::AfterBreak { handle } => range.set_start_after(handle),
        };
        placed.ok()?;
        range.collapse_with_to_start(true);

        visible(&range.get_bounding_client_rect()).or_else(|| match position {
            // Collapsed ranges beside a break often measure empty
            RunPosition::BeforeBreak { handle } => element_rect(handle),
            RunPosition::AfterBreak { handle } if is_block(handle) => element_rect(handle),
            RunPosition::AfterBreak { handle } => handle.next_sibling().as_ref().and_then(element_rect),
            RunPosition::InText { .. } => None,
        })
    }

    fn bounds(&self) -> Rect {
        let rect = self.root.get_bounding_client_rect();
        Rect {
            x: rect.x(),
            y: rect.y(),
            width: rect.width(),
            height: rect.height(),
        }
    }

    fn scroll_offset(&self) -> (f64, f64) {
        (f64::from(self.root.scroll_left()), f64::from(self.root.scroll_top()))
    }
}

/// Parse a computed `font-size` such as `"16px"`
pub fn parse_px(value: &str) -> Option<f64> {
    value.trim().strip_suffix("px")?.trim().parse().ok()
}

/// Computed font size of the editor, in pixels
pub fn font_px(root: &HtmlElement) -> Option<f64> {
    let style = window()?.get_computed_style(root).ok()??;
    parse_px(&style.get_property_value("font-size").ok()?)
}

/// Replace the painted markers with `markers`
pub fn paint(root: &HtmlElement, markers: &[Marker]) -> Result<(), JsValue> {
    let old = root.query_selector_all(&format!(".{MARKER_CLASS}"))?;
    for i in 0..old.length() {
        if let Some(el) = old.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
            el.remove();
        }
    }

    let document = get_document().ok_or("no document")?;
    for marker in markers {
        let el = document.create_element("div")?.dyn_into::<HtmlElement>()?;
        el.set_class_name(MARKER_CLASS);
        el.set_attribute("contenteditable", "false")?;
        let style = el.style();
        style.set_property("left", &format!("{}px", marker.left))?;
        style.set_property("top", &format!("{}px", marker.top))?;
        style.set_property("width", &format!("{}px", marker.width_px))?;
        style.set_property("height", &format!("{}em", marker.height_em))?;
        style.set_property("background", marker.color)?;

        let label = document.create_element("span")?.dyn_into::<HtmlElement>()?;
        label.set_text_content(Some(&marker.id));
        label.style().set_property("background", marker.color)?;
        el.append_child(&label)?;
        root.append_child(&el)?;
    }
    Ok(())
}
