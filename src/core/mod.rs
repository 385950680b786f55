//! # Core
//!
//! Building blocks the cluster dispatcher is assembled from.
//!
//! ## Modules
//!
//! - [`builder`] - Client configuration and builder
//! - [`command`] - Command construction and reply conversion
//! - [`connection`] - Single request/response node connection
//! - [`transport`] - Transport boundary and the TCP implementation

pub use crate::proto::error::{Error, Result};

/// Client builder configuration.
pub mod builder;
/// Command construction helpers.
pub mod command;
/// Low-level connection management.
pub mod connection;
pub mod transport;
