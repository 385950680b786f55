//! RESP (Redis Serialization Protocol) codec.
//!
//! Encoding of commands and decoding of typed replies for the TCP transport.
//!
//! ## Modules
//!
//! - [`codec`] - Encoder and decoder for RESP protocol
//! - [`error`] - Error types shared by the whole crate
//! - [`frame`] - Frame types representing RESP data structures

pub mod codec;
/// Error types.
pub mod error;
pub mod frame;
