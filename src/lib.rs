//! # Shardwalk
//!
//! Cluster-aware client for RESP key-value stores. Commands are routed to
//! the node owning their key's slot, and the client follows the cluster's
//! `MOVED`/`ASK` redirects and fails over between nodes on its own.
//!
//! ## Features
//!
//! - `test-utils` - In-memory [`testing::MockTransport`] for exercising
//!   routing without sockets
//!
//! ## Example
//!
//! ```no_run
//! use shardwalk::ClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = ClientBuilder::new()
//!         .address("redis://127.0.0.1:7000")
//!         .build()
//!         .await?;
//!     client.set("greeting", "hello").await?;
//!     let _ = client.get("greeting").await?;
//!     client.close();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub(crate) mod core;
pub(crate) mod proto;

pub mod cluster;

#[cfg(test)]
mod stress;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export high-level client types for convenience
pub use crate::core::builder::{ClientBuilder, ClusterConfig, DEFAULT_MAX_REDIRECTS};
pub use crate::core::command::Cmd;
pub use crate::core::connection::Connection;
pub use crate::core::transport::{NodeAddress, TcpTransport, Timeouts, Transport};
pub use crate::core::{Error, Result};
pub use crate::proto::frame::Frame;

pub use crate::cluster::{key_slot, ClusterClient, NodeId, SLOT_COUNT};
