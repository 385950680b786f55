//! RESP frame types.
//!
//! A [`Frame`] is both the wire form of a command (an array of bulk strings)
//! and the typed reply handed back by a cluster node.

mod types;

pub use types::Frame;
