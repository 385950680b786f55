//! Slot → node routing hints.

use crate::cluster::registry::NodeId;
use crate::cluster::slot::SLOT_COUNT;

/// Maps each slot to the node last seen serving it.
///
/// Entries are hints only: a stale entry costs one `MOVED` redirect, after
/// which the dispatcher overwrites it.
#[derive(Debug, Clone)]
pub struct ShardRouteCache {
    routes: Box<[Option<NodeId>]>,
}

impl Default for ShardRouteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardRouteCache {
    /// Creates an empty cache covering all 16384 slots.
    pub fn new() -> Self {
        Self {
            routes: vec![None; SLOT_COUNT as usize].into_boxed_slice(),
        }
    }

    /// Returns the node cached for `slot`.
    #[inline]
    pub fn lookup(&self, slot: u16) -> Option<NodeId> {
        self.routes.get(slot as usize).copied().flatten()
    }

    /// Records `node` as the owner of `slot`, replacing any previous entry.
    /// Slots outside the key space are ignored.
    #[inline]
    pub fn record(&mut self, slot: u16, node: NodeId) {
        if let Some(entry) = self.routes.get_mut(slot as usize) {
            *entry = Some(node);
        }
    }

    /// Clears the entry for `slot`.
    #[inline]
    pub fn invalidate(&mut self, slot: u16) {
        if let Some(entry) = self.routes.get_mut(slot as usize) {
            *entry = None;
        }
    }

    /// Returns the number of slots with a cached route.
    pub fn len(&self) -> usize {
        self.routes.iter().filter(|r| r.is_some()).count()
    }

    /// Returns true if no slot has a cached route.
    pub fn is_empty(&self) -> bool {
        self.routes.iter().all(Option::is_none)
    }
}
