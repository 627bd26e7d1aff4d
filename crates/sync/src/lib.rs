//! Collaborative synchronization engine for mdcollab
//!
//! Everything here is I/O free so it runs unchanged in the host, in the
//! wasm client, and under test:
//! - `segment`/`tree`: the editable tree seen as a flat run of text and break segments
//! - `offset`: caret anchor <-> absolute character offset
//! - `reconcile`: diff-based merge of an authoritative text with caret adjustment
//! - `throttle`: clock-injected leading/trailing throttle
//! - `client`: per-tab connection state machine
//! - `overlay`: remote cursor marker layout

pub mod client;
pub mod offset;
pub mod overlay;
pub mod reconcile;
pub mod segment;
pub mod text;
pub mod throttle;
pub mod tree;

pub use client::{ConnectionState, EditableDocument, Inbound, SyncClient, SyncConfig};
pub use offset::{document_len, to_anchor, to_offset, AbsoluteOffset, Anchor};
pub use overlay::{color_for, locate, Marker, OverlayRenderer, Rect, RenderSurface, RenderedRun, RunPosition};
pub use reconcile::{reconcile, Edit, Patch, Reconciled};
pub use segment::{flatten, NodeKey, Segment, SegmentSource, Segments};
pub use throttle::{Clock, Emission, ManualClock, SystemClock, Throttle};
pub use tree::LineTree;
