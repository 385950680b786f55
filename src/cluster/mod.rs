//! # Cluster routing
//!
//! Slot routing and redirect handling for a sharded key-value cluster.
//!
//! ## How a command finds its node
//!
//! - **Slot hashing**: a key maps to one of 16384 slots ([`key_slot`]),
//!   honoring `{...}` hash tags.
//! - **Route cache**: the node that last served a slot is remembered
//!   ([`ShardRouteCache`]) and tried first.
//! - **Redirects**: `MOVED` re-routes the slot for good; `ASK` retries once
//!   on the named node after `ASKING`, leaving routes untouched.
//! - **Failover**: known nodes form a ring ([`NodeRegistry`]); when a node
//!   cannot be reached the ring is walked until one answers
//!   ([`ConnectionManager`]).
//!
//! ## Example
//!
//! ```no_run
//! # async fn example() -> shardwalk::Result<()> {
//! use shardwalk::ClusterClient;
//!
//! let mut client = ClusterClient::connect("127.0.0.1", 7000).await?;
//!
//! // keys sharing a hash tag land on the same node
//! client.hset("{user:42}:profile", "name", "alice").await?;
//! client.expire("{user:42}:profile", 3600).await?;
//! let visits = client.incr("{user:42}:visits").await?;
//! # let _ = visits;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod commands;
mod pool;
mod redirect;
mod registry;
mod routes;
pub(crate) mod slot;

pub use client::ClusterClient;
pub use pool::ConnectionManager;
pub use redirect::{parse_redirect, Redirect};
pub use registry::{FailoverScan, Node, NodeId, NodeRegistry};
pub use routes::ShardRouteCache;
pub use slot::{key_slot, SLOT_COUNT};
