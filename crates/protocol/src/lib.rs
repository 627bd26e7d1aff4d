//! Shared protocol types for mdcollab
//!
//! Defines the messages exchanged between the host and browser clients,
//! and the MessagePack/JSON codec used to frame them.

pub mod codec;
pub mod messages;

pub use codec::*;
pub use messages::*;
