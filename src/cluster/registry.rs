//! The ring of known cluster nodes.
//!
//! Nodes live in an arena and are referred to by [`NodeId`], an index that
//! stays valid for the life of the registry. A separate ring order plus a
//! cursor give round-robin failover: new nodes are linked in right after the
//! cursor and walking the ring is `(start + i) % len`.

use std::fmt;

use crate::core::transport::NodeAddress;

/// Stable handle to a node in a [`NodeRegistry`].
///
/// Handles are never reused or invalidated; nodes are only dropped with the
/// registry itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the arena index behind this handle.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A known cluster node and its (at most one) live connection.
#[derive(Debug)]
pub struct Node<C> {
    address: NodeAddress,
    connection: Option<C>,
}

impl<C> Node<C> {
    fn new(address: NodeAddress) -> Self {
        Self {
            address,
            connection: None,
        }
    }

    /// Returns the node address.
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Returns true if the node currently holds a connection.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut C> {
        self.connection.as_mut()
    }

    pub(crate) fn take_connection(&mut self) -> Option<C> {
        self.connection.take()
    }

    pub(crate) fn set_connection(&mut self, connection: C) -> &mut C {
        self.connection.insert(connection)
    }
}

/// Ordered, circular collection of nodes plus a "current" cursor.
///
/// `(host, port)` is unique within the registry.
#[derive(Debug)]
pub struct NodeRegistry<C> {
    nodes: Vec<Node<C>>,
    ring: Vec<NodeId>,
    /// Position of the cursor in `ring`.
    cursor: Option<usize>,
}

impl<C> Default for NodeRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> NodeRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            ring: Vec::new(),
            cursor: None,
        }
    }

    /// Returns the number of nodes in the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns true if no node has been registered.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Finds the node with `address`, inserting it if unknown, and makes it
    /// current.
    ///
    /// A new node is linked into the ring immediately after the cursor.
    pub fn find_or_insert(&mut self, address: &NodeAddress) -> NodeId {
        if let Some(pos) = self.position_of_address(address) {
            self.cursor = Some(pos);
            return self.ring[pos];
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(address.clone()));

        let pos = self.cursor.map_or(0, |c| c + 1);
        self.ring.insert(pos, id);
        self.cursor = Some(pos);
        id
    }

    /// Looks up a node by address without modifying the registry.
    pub fn find(&self, address: &NodeAddress) -> Option<NodeId> {
        self.position_of_address(address).map(|pos| self.ring[pos])
    }

    /// Returns the node under the cursor.
    pub fn current(&self) -> Option<NodeId> {
        self.cursor.map(|pos| self.ring[pos])
    }

    /// Moves the cursor to `id`.
    pub fn set_current(&mut self, id: NodeId) {
        if let Some(pos) = self.ring.iter().position(|&n| n == id) {
            self.cursor = Some(pos);
        }
    }

    /// Moves the cursor one step around the ring and returns the new
    /// current node.
    pub fn advance(&mut self) -> Option<NodeId> {
        let len = self.ring.len();
        let pos = (self.cursor? + 1) % len;
        self.cursor = Some(pos);
        Some(self.ring[pos])
    }

    /// Returns a walk over the ring starting at `start` that visits every
    /// node exactly once.
    ///
    /// The walk is a snapshot of the ring order, so it does not borrow the
    /// registry and can be cloned to restart it.
    pub fn failover_scan(&self, start: NodeId) -> FailoverScan {
        let start = self.ring.iter().position(|&n| n == start).unwrap_or(0);
        FailoverScan {
            order: self.ring.clone(),
            start,
            step: 0,
        }
    }

    /// Returns the node behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this registry.
    pub fn node(&self, id: NodeId) -> &Node<C> {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<C> {
        &mut self.nodes[id.0]
    }

    /// Returns node addresses in ring order.
    pub fn addresses(&self) -> impl Iterator<Item = &NodeAddress> + '_ {
        self.ring.iter().map(move |&id| &self.nodes[id.0].address)
    }

    /// Takes every live connection out of the registry.
    pub(crate) fn drain_connections(&mut self) -> impl Iterator<Item = C> + '_ {
        self.nodes.iter_mut().filter_map(Node::take_connection)
    }

    fn position_of_address(&self, address: &NodeAddress) -> Option<usize> {
        self.ring
            .iter()
            .position(|&id| &self.nodes[id.0].address == address)
    }
}

/// One full traversal of the ring, in ring order.
#[derive(Debug, Clone)]
pub struct FailoverScan {
    order: Vec<NodeId>,
    start: usize,
    step: usize,
}

impl Iterator for FailoverScan {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.step >= self.order.len() {
            return None;
        }
        let id = self.order[(self.start + self.step) % self.order.len()];
        self.step += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len() - self.step;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FailoverScan {}
