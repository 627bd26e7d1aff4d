//! Per-tab synchronization state machine
//!
//! `Disconnected -> AwaitingInitialDocument -> Synced`. The client owns no
//! socket: local events go in, [`ClientMessage`]s to send come out, and
//! inbound [`ServerMessage`]s are applied to the editable document passed
//! in by the caller.

use std::time::Duration;

use mdcollab_protocol::{without_client, ClientCursor, ClientMessage, ConnectionId, ServerMessage};
use web_time::Instant;

use crate::offset::{to_anchor, to_offset, AbsoluteOffset, Anchor};
use crate::reconcile::{reconcile, Reconciled};
use crate::segment::{flatten, SegmentSource};
use crate::throttle::{Clock, Emission, SystemClock, Throttle};

/// Editor surface the client drives
pub trait EditableDocument: SegmentSource {
    /// Current caret; `None` without a selection or while detached
    fn caret(&self) -> Option<Anchor>;

    /// Replace the entire content
    fn replace_text(&mut self, text: &str);

    fn set_caret(&mut self, anchor: Anchor);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    AwaitingInitialDocument,
    Synced,
}

/// Outbound throttle windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub text_window: Duration,
    pub cursor_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            text_window: Duration::from_millis(150),
            cursor_window: Duration::from_millis(50),
        }
    }
}

/// What an inbound message changed locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Nothing to repaint
    Unchanged,
    /// Document content (and caret) replaced
    Document,
    /// Remote cursor list replaced
    Cursors,
}

pub struct SyncClient<C: Clock = SystemClock> {
    state: ConnectionState,
    client_id: Option<ConnectionId>,
    last_sent_text: String,
    last_known_offset: AbsoluteOffset,
    text_throttle: Throttle<String, C>,
    cursor_throttle: Throttle<AbsoluteOffset, C>,
    other_cursors: Vec<ClientCursor>,
}

impl SyncClient {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock + Clone> SyncClient<C> {
    pub fn with_clock(config: SyncConfig, clock: C) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            client_id: None,
            last_sent_text: String::new(),
            last_known_offset: 0,
            text_throttle: Throttle::with_clock(config.text_window, clock.clone()),
            cursor_throttle: Throttle::with_clock(config.cursor_window, clock),
            other_cursors: Vec::new(),
        }
    }
}

impl<C: Clock> SyncClient<C> {
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Cursors of every other client, for the overlay
    pub fn other_cursors(&self) -> &[ClientCursor] {
        &self.other_cursors
    }

    pub fn last_sent_text(&self) -> &str {
        &self.last_sent_text
    }

    pub const fn last_known_offset(&self) -> AbsoluteOffset {
        self.last_known_offset
    }

    /// Socket opened; wait for the canonical document
    pub fn connect(&mut self) {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = ?self.state, "connect while already connected, restarting");
        }
        self.reset_session();
        self.state = ConnectionState::AwaitingInitialDocument;
    }

    /// Socket closed; pending emissions are discarded
    pub fn disconnect(&mut self) {
        self.reset_session();
        self.state = ConnectionState::Disconnected;
    }

    fn reset_session(&mut self) {
        self.text_throttle.reset();
        self.cursor_throttle.reset();
        self.client_id = None;
        self.other_cursors.clear();
    }

    /// The tree changed under local editing
    pub fn local_change<D: EditableDocument + ?Sized>(&mut self, doc: &D) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        if self.state != ConnectionState::Synced {
            return out;
        }
        let Some(text) = flatten(doc) else {
            tracing::debug!("tree unavailable, skipping local change");
            return out;
        };

        if text != self.last_sent_text {
            self.last_sent_text.clone_from(&text);
            if let Emission::Emitted(text) = self.text_throttle.try_emit(text) {
                out.push(ClientMessage::SendText { text });
            }
        }

        if let Some(offset) = doc.caret().and_then(|anchor| to_offset(doc, anchor)) {
            self.offer_cursor(offset, &mut out);
        }
        out
    }

    /// The caret moved without a content change
    pub fn selection_change<D: EditableDocument + ?Sized>(&mut self, doc: &D) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        if self.state != ConnectionState::Synced {
            return out;
        }
        match doc.caret().and_then(|anchor| to_offset(doc, anchor)) {
            Some(offset) if offset != self.last_known_offset => self.offer_cursor(offset, &mut out),
            _ => {}
        }
        out
    }

    fn offer_cursor(&mut self, offset: AbsoluteOffset, out: &mut Vec<ClientMessage>) {
        self.last_known_offset = offset;
        if let Emission::Emitted(offset) = self.cursor_throttle.try_emit(offset) {
            if let Some(msg) = self.cursor_message(offset) {
                out.push(msg);
            }
        }
    }

    fn cursor_message(&self, offset: AbsoluteOffset) -> Option<ClientMessage> {
        Some(ClientMessage::SendCursor {
            offset,
            client_id: self.client_id.clone()?,
        })
    }

    /// Release coalesced emissions whose window has passed
    pub fn poll(&mut self) -> Vec<ClientMessage> {
        let mut out = Vec::new();
        if self.state != ConnectionState::Synced {
            return out;
        }
        if let Some(text) = self.text_throttle.poll() {
            out.push(ClientMessage::SendText { text });
        }
        if let Some(msg) = self
            .cursor_throttle
            .poll()
            .and_then(|offset| self.cursor_message(offset))
        {
            out.push(msg);
        }
        out
    }

    /// Earliest time [`poll`](Self::poll) has something to release
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.text_throttle.deadline(), self.cursor_throttle.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Apply a message from the host
    pub fn handle_server<D: EditableDocument + ?Sized>(
        &mut self,
        msg: ServerMessage,
        doc: &mut D,
    ) -> Inbound {
        match msg {
            ServerMessage::LoadDocument {
                client_id,
                text,
                cursors,
            } => {
                if self.state == ConnectionState::Disconnected {
                    tracing::debug!("load-document while disconnected, ignoring");
                    return Inbound::Unchanged;
                }
                self.other_cursors = without_client(&cursors, &client_id);
                tracing::info!(client_id = %client_id, len = text.len(), "document loaded");
                self.client_id = Some(client_id);
                self.state = ConnectionState::Synced;
                self.apply_remote_text(doc, &text);
                Inbound::Document
            }
            ServerMessage::ReceiveText { text } => {
                if self.state != ConnectionState::Synced {
                    tracing::debug!(state = ?self.state, "receive-text before sync, ignoring");
                    return Inbound::Unchanged;
                }
                if self.apply_remote_text(doc, &text) {
                    Inbound::Document
                } else {
                    Inbound::Unchanged
                }
            }
            ServerMessage::UpdateCursors { cursors } => {
                let cursors = match &self.client_id {
                    Some(own) => without_client(&cursors, own),
                    None => cursors,
                };
                if cursors == self.other_cursors {
                    return Inbound::Unchanged;
                }
                self.other_cursors = cursors;
                Inbound::Cursors
            }
        }
    }

    /// Merge authoritative text into the tree; true if the tree changed
    fn apply_remote_text<D: EditableDocument + ?Sized>(&mut self, doc: &mut D, incoming: &str) -> bool {
        let Some(local) = flatten(&*doc) else {
            tracing::debug!("tree unavailable, skipping remote text");
            return false;
        };
        if local == incoming {
            self.last_sent_text = local;
            return false;
        }

        let local_offset = doc
            .caret()
            .and_then(|anchor| to_offset(&*doc, anchor))
            .unwrap_or(self.last_known_offset);
        let Reconciled {
            merged_text,
            adjusted_offset,
        } = reconcile(&local, incoming, local_offset);

        doc.replace_text(&merged_text);
        if let Some(anchor) = to_anchor(&*doc, adjusted_offset) {
            doc.set_caret(anchor);
        }

        // A coalesced local text predates the authoritative one
        if self.text_throttle.cancel_pending().is_some() {
            tracing::debug!("dropped superseded local text");
        }
        self.last_sent_text = merged_text;
        self.last_known_offset = adjusted_offset;
        true
    }
}
