//! Cluster client with slot routing and redirect handling.

use std::fmt;
use std::io;

use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use crate::core::builder::ClusterConfig;
use crate::core::command::{self, frame_to_bool, frame_to_bytes, frame_to_int, frame_to_ok, Cmd};
use crate::core::transport::{NodeAddress, TcpTransport, Transport};
use crate::proto::frame::Frame;
use crate::{Error, Result};

use super::commands;
use super::pool::ConnectionManager;
use super::redirect::{parse_redirect, Redirect};
use super::registry::{NodeId, NodeRegistry};
use super::routes::ShardRouteCache;
use super::slot::key_slot;

/// Cluster client.
///
/// Keeps a ring of known nodes, a slot → node routing cache and at most one
/// connection per node. Routing state is learned from the cluster's own
/// `MOVED`/`ASK` replies; no topology query is ever issued.
///
/// A client is a single-owner handle: every call takes `&mut self`. Use one
/// client per task, or wrap it in a mutex to share it.
///
/// # Example
///
/// ```no_run
/// use shardwalk::ClusterClient;
///
/// # #[tokio::main]
/// # async fn main() -> shardwalk::Result<()> {
/// let mut client = ClusterClient::connect("127.0.0.1", 7000).await?;
/// client.set("user:1:name", "alice").await?;
/// let name = client.get("user:1:name").await?;
/// assert_eq!(name.as_deref(), Some(&b"alice"[..]));
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct ClusterClient<T: Transport = TcpTransport> {
    registry: NodeRegistry<T::Connection>,
    routes: ShardRouteCache,
    connections: ConnectionManager<T>,
    config: ClusterConfig,
}

impl<T: Transport> fmt::Debug for ClusterClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterClient")
            .field("nodes", &self.known_nodes())
            .field("current", &self.current_node())
            .field("routed_slots", &self.routed_slot_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClusterClient<TcpTransport> {
    /// Connects over TCP with the default configuration.
    ///
    /// `seed_host` may resolve to several addresses; every one becomes a
    /// known node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolve`] if the seed cannot be resolved and
    /// [`Error::AllNodesUnreachable`] if no resolved node accepts a
    /// connection.
    pub async fn connect(seed_host: &str, seed_port: u16) -> Result<Self> {
        Self::connect_with(TcpTransport, seed_host, seed_port, ClusterConfig::default()).await
    }
}

impl<T: Transport> ClusterClient<T> {
    /// Connects over `transport`.
    ///
    /// The seed is resolved and every address inserted into the ring. The
    /// starting node is offset by the process id so that many processes
    /// sharing a seed spread their first connections, then a connection is
    /// established to the first reachable node from there.
    pub async fn connect_with(
        transport: T,
        seed_host: &str,
        seed_port: u16,
        config: ClusterConfig,
    ) -> Result<Self> {
        let connections = ConnectionManager::new(transport, config.timeouts);

        let addresses = connections.resolve(seed_host, seed_port).await?;
        if addresses.is_empty() {
            return Err(Error::Resolve {
                host: seed_host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }
        info!(
            host = seed_host,
            port = seed_port,
            count = addresses.len(),
            "resolved seed"
        );

        let mut registry = NodeRegistry::new();
        for address in &addresses {
            registry.find_or_insert(address);
        }
        let offset = std::process::id() as usize % registry.len();
        for _ in 0..offset {
            registry.advance();
        }

        connections.ensure_any_connection(&mut registry).await?;

        Ok(Self {
            registry,
            routes: ShardRouteCache::new(),
            connections,
            config,
        })
    }

    /// Executes a command, following redirects.
    ///
    /// `key` selects the slot the command is routed by; keyless commands go
    /// to the current node. Error replies other than redirects are returned
    /// as [`Frame::Error`], untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::AllNodesUnreachable`] when no node can serve the command
    /// - [`Error::TooManyRedirects`] when the redirect bound is exceeded
    #[instrument(skip(self), level = "debug")]
    pub async fn execute(&mut self, key: Option<&str>, cmd: Cmd) -> Result<Frame> {
        let slot = key.map(key_slot);
        if let Some(node) = slot.and_then(|s| self.routes.lookup(s)) {
            debug!(?slot, %node, "route cache hit");
            self.registry.set_current(node);
        }

        let mut redirects = 0;
        let mut asking = false;
        loop {
            if asking {
                let (_, reply) = self.send_with_failover(&commands::asking()).await?;
                if !reply.is_ok_status() {
                    warn!(?reply, "unexpected reply to ASKING");
                }
            }

            let (node, reply) = self.send_with_failover(&cmd).await?;
            let redirect = match reply.error_message() {
                None => {
                    if let (Some(slot), false) = (slot, asking) {
                        self.routes.record(slot, node);
                    }
                    return Ok(reply);
                }
                Some(message) => parse_redirect(message),
            };
            let Some(redirect) = redirect else {
                return Ok(reply);
            };

            redirects += 1;
            if let Some(limit) = self.config.max_redirects {
                if redirects > limit {
                    warn!(limit, "redirect limit exceeded");
                    return Err(Error::TooManyRedirects { limit });
                }
            }

            if !redirect.is_ask() {
                self.routes.invalidate(redirect.slot());
            }
            let known = self.registry.len();
            let target = self.registry.find_or_insert(redirect.address());
            if self.registry.len() > known {
                info!(address = %redirect.address(), "learned new node from redirect");
            }

            match redirect {
                Redirect::Moved { slot: moved, .. } => {
                    warn!(slot = moved, address = %self.registry.node(target).address(), "MOVED");
                    self.routes.record(moved, target);
                    asking = false;
                }
                Redirect::Ask { slot: asked, .. } => {
                    debug!(slot = asked, address = %self.registry.node(target).address(), "ASK");
                    asking = true;
                }
            }
        }
    }

    /// Sends `cmd` to the current node, failing over around the ring on
    /// transport errors.
    ///
    /// A failed node loses its connection and is reconnected when the walk
    /// comes back to it. Only a node failing a second time within one call
    /// counts towards the bound: its connection was then opened by this call,
    /// so the failure is not an idle connection the server already dropped.
    async fn send_with_failover(&mut self, cmd: &Cmd) -> Result<(NodeId, Frame)> {
        let mut dropped: Vec<NodeId> = Vec::new();
        let mut failures = 0;
        loop {
            let node = self
                .connections
                .ensure_any_connection(&mut self.registry)
                .await?;
            debug!(address = %self.registry.node(node).address(), ?cmd, "sending command");

            match self.connections.send(&mut self.registry, node, cmd).await {
                Ok(reply) => return Ok((node, reply)),
                Err(err) => {
                    if dropped.contains(&node) {
                        failures += 1;
                        if failures >= self.registry.len() {
                            warn!(%err, failures, "every node failed the command on a new connection");
                            return Err(err);
                        }
                    } else {
                        dropped.push(node);
                    }
                    self.registry.advance();
                }
            }
        }
    }

    /// Gets the value of a key.
    pub async fn get(&mut self, key: &str) -> Result<Option<Bytes>> {
        let reply = self.execute(Some(key), command::get(key.to_owned())).await?;
        frame_to_bytes(reply)
    }

    /// Sets a key to a value. Returns `true` when the store acknowledged
    /// with `OK`.
    pub async fn set(&mut self, key: &str, value: impl Into<Bytes>) -> Result<bool> {
        let reply = self
            .execute(Some(key), command::set(key.to_owned(), value))
            .await?;
        frame_to_ok(reply)
    }

    /// Gets a field of a hash.
    pub async fn hget(&mut self, key: &str, field: impl Into<Bytes>) -> Result<Option<Bytes>> {
        let reply = self
            .execute(Some(key), command::hget(key.to_owned(), field))
            .await?;
        frame_to_bytes(reply)
    }

    /// Sets a field of a hash. Returns `true` if the field was newly
    /// created, `false` if an existing field was overwritten.
    pub async fn hset(
        &mut self,
        key: &str,
        field: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Result<bool> {
        let reply = self
            .execute(Some(key), command::hset(key.to_owned(), field, value))
            .await?;
        frame_to_bool(reply)
    }

    /// Sets a timeout on a key. Returns `true` if the key exists and the
    /// timeout was set.
    pub async fn expire(&mut self, key: &str, seconds: u64) -> Result<bool> {
        let reply = self
            .execute(Some(key), command::expire(key.to_owned(), seconds))
            .await?;
        frame_to_bool(reply)
    }

    /// Adds `delta` to the integer stored at a key and returns the result.
    pub async fn incr_by(&mut self, key: &str, delta: i64) -> Result<i64> {
        let reply = self
            .execute(Some(key), command::incr_by(key.to_owned(), delta))
            .await?;
        frame_to_int(reply)
    }

    /// Increments the integer stored at a key by one.
    pub async fn incr(&mut self, key: &str) -> Result<i64> {
        self.incr_by(key, 1).await
    }

    /// Deletes a key. Returns `true` if it existed.
    pub async fn del(&mut self, key: &str) -> Result<bool> {
        let reply = self.execute(Some(key), command::del(key.to_owned())).await?;
        frame_to_bool(reply)
    }

    /// Returns `true` if the key exists.
    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        let reply = self
            .execute(Some(key), command::exists(key.to_owned()))
            .await?;
        frame_to_bool(reply)
    }

    /// Sends `READONLY` to the current node.
    pub async fn readonly(&mut self) -> Result<bool> {
        self.mark(commands::readonly()).await
    }

    /// Sends `READWRITE` to the current node.
    pub async fn readwrite(&mut self) -> Result<bool> {
        self.mark(commands::readwrite()).await
    }

    /// Sends an administrative command outside redirect handling. Only an
    /// `OK` status counts as success.
    async fn mark(&mut self, cmd: Cmd) -> Result<bool> {
        let (_, reply) = self.send_with_failover(&cmd).await?;
        match reply.error_message() {
            Some(message) => Err(Error::server(message)),
            None => Ok(reply.is_ok_status()),
        }
    }

    /// Closes every connection and drops the client.
    pub fn close(mut self) {
        let closed = self.connections.close_all(&mut self.registry);
        debug!(closed, "client closed");
    }

    /// Returns the number of known nodes.
    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the known node addresses in ring order.
    pub fn known_nodes(&self) -> Vec<NodeAddress> {
        self.registry.addresses().cloned().collect()
    }

    /// Returns the node under the ring cursor.
    pub fn current_node(&self) -> Option<&NodeAddress> {
        self.registry
            .current()
            .map(|id| self.registry.node(id).address())
    }

    /// Returns the node cached for `slot`.
    pub fn cached_route(&self, slot: u16) -> Option<&NodeAddress> {
        self.routes
            .lookup(slot)
            .map(|id| self.registry.node(id).address())
    }

    /// Returns the number of slots with a cached route.
    pub fn routed_slot_count(&self) -> usize {
        self.routes.len()
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }
}
