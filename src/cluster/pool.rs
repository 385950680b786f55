//! Per-node connection management.
//!
//! Each node holds at most one connection. Connections are opened lazily,
//! dropped as soon as they fail, and reopened on the next use. When the
//! current node cannot be reached the manager walks the ring until some
//! node accepts a connection.

use tracing::{debug, error, warn};

use crate::cluster::registry::{NodeId, NodeRegistry};
use crate::core::command::Cmd;
use crate::core::transport::{NodeAddress, Timeouts, Transport};
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// Opens, reuses and discards node connections over a [`Transport`].
#[derive(Debug)]
pub struct ConnectionManager<T: Transport> {
    transport: T,
    timeouts: Timeouts,
}

impl<T: Transport> ConnectionManager<T> {
    /// Creates a manager applying `timeouts` to every connection it opens.
    pub fn new(transport: T, timeouts: Timeouts) -> Self {
        Self {
            transport,
            timeouts,
        }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the configured timeouts.
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Expands a seed into candidate node addresses.
    pub async fn resolve(&self, host: &str, port: u16) -> Result<Vec<NodeAddress>> {
        self.transport.resolve(host, port).await
    }

    /// Returns the live connection of `node`, connecting first if it has
    /// none.
    ///
    /// On failure the node is left without a connection.
    pub async fn get_connection<'r>(
        &self,
        registry: &'r mut NodeRegistry<T::Connection>,
        node: NodeId,
    ) -> Result<&'r mut T::Connection> {
        let entry = registry.node_mut(node);
        let connection = match entry.take_connection() {
            Some(connection) => connection,
            None => self
                .transport
                .connect(entry.address(), &self.timeouts)
                .await
                .inspect_err(|err| warn!(address = %entry.address(), %err, "connect failed"))?,
        };
        Ok(entry.set_connection(connection))
    }

    /// Walks the ring from the cursor until some node has a live
    /// connection, moves the cursor there and returns it.
    ///
    /// A current node that is already connected is returned without walking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllNodesUnreachable`] once every node has been tried
    /// once without success.
    pub async fn ensure_any_connection(
        &self,
        registry: &mut NodeRegistry<T::Connection>,
    ) -> Result<NodeId> {
        let start = registry
            .current()
            .ok_or(Error::AllNodesUnreachable { attempted: 0 })?;
        if registry.node(start).is_connected() {
            return Ok(start);
        }

        let scan = registry.failover_scan(start);
        let attempted = scan.len();

        for node in scan {
            if self.get_connection(registry, node).await.is_ok() {
                if node != start {
                    warn!(address = %registry.node(node).address(), "failed over");
                }
                registry.set_current(node);
                return Ok(node);
            }
        }

        error!(attempted, "all cluster nodes are unreachable");
        Err(Error::AllNodesUnreachable { attempted })
    }

    /// Sends `cmd` to `node` and waits for the reply.
    ///
    /// A transport failure discards the node's connection before the error
    /// is returned.
    pub async fn send(
        &self,
        registry: &mut NodeRegistry<T::Connection>,
        node: NodeId,
        cmd: &Cmd,
    ) -> Result<Frame> {
        let connection = self.get_connection(registry, node).await?;
        match self.transport.send(connection, cmd).await {
            Ok(frame) => {
                debug!(?frame, "received frame");
                Ok(frame)
            }
            Err(err) => {
                warn!(address = %registry.node(node).address(), %err, "send failed");
                self.disconnect(registry, node);
                Err(err)
            }
        }
    }

    /// Closes the connection of `node`, if any.
    pub fn disconnect(&self, registry: &mut NodeRegistry<T::Connection>, node: NodeId) {
        if let Some(connection) = registry.node_mut(node).take_connection() {
            debug!(address = %registry.node(node).address(), "closing connection");
            self.transport.close(connection);
        }
    }

    /// Closes every connection held by the registry and returns how many
    /// were closed.
    pub fn close_all(&self, registry: &mut NodeRegistry<T::Connection>) -> usize {
        let mut closed = 0;
        for connection in registry.drain_connections() {
            self.transport.close(connection);
            closed += 1;
        }
        closed
    }
}
