//! An in-memory cluster that answers commands the way real nodes do.
//!
//! Nodes own slot ranges and answer `MOVED` for keys they do not own, a
//! migrating slot answers `ASK` for keys that already left, and an importing
//! node accepts such keys only right after `ASKING`. A node with no slots
//! assigned serves every key. Replies pushed with
//! [`push_reply`](FakeCluster::push_reply) are returned before any of this.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::RangeInclusive;

use bytes::Bytes;

use crate::cluster::slot::key_slot;
use crate::core::command::Cmd;
use crate::core::transport::NodeAddress;
use crate::proto::frame::Frame;

/// Per-connection state a node keeps between commands.
#[derive(Debug, Default, Clone)]
pub struct Session {
    asking: bool,
}

#[derive(Debug, Clone)]
enum Value {
    Str(Bytes),
    Hash(HashMap<Bytes, Bytes>),
}

#[derive(Debug)]
struct FakeNode {
    address: NodeAddress,
    reachable: bool,
    failing_sends: usize,
    replies: VecDeque<Frame>,
    slots: Vec<RangeInclusive<u16>>,
    migrating: HashMap<u16, NodeAddress>,
    importing: HashSet<u16>,
    data: HashMap<Bytes, Value>,
}

impl FakeNode {
    fn new(address: NodeAddress) -> Self {
        Self {
            address,
            reachable: true,
            failing_sends: 0,
            replies: VecDeque::new(),
            slots: Vec::new(),
            migrating: HashMap::new(),
            importing: HashSet::new(),
            data: HashMap::new(),
        }
    }

    fn owns(&self, slot: u16) -> bool {
        self.slots.iter().any(|range| range.contains(&slot))
    }

    fn is_sharded(&self) -> bool {
        !self.slots.is_empty() || !self.importing.is_empty()
    }

    fn execute(&mut self, name: &[u8], args: &[Bytes]) -> Frame {
        match (name, args) {
            (b"PING", []) => Frame::SimpleString(b"PONG".to_vec()),
            (b"READONLY" | b"READWRITE", []) => ok(),
            (b"GET", [key]) => match self.data.get(key) {
                Some(Value::Str(value)) => Frame::BulkString(Some(value.clone())),
                Some(Value::Hash(_)) => wrong_type(),
                None => Frame::BulkString(None),
            },
            (b"SET", [key, value]) => {
                self.data.insert(key.clone(), Value::Str(value.clone()));
                ok()
            }
            (b"HGET", [key, field]) => match self.data.get(key) {
                Some(Value::Hash(hash)) => Frame::BulkString(hash.get(field).cloned()),
                Some(Value::Str(_)) => wrong_type(),
                None => Frame::BulkString(None),
            },
            (b"HSET", [key, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                let entry = self
                    .data
                    .entry(key.clone())
                    .or_insert_with(|| Value::Hash(HashMap::new()));
                let Value::Hash(hash) = entry else {
                    return wrong_type();
                };
                let mut added = 0;
                for pair in pairs.chunks(2) {
                    if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                        added += 1;
                    }
                }
                Frame::Integer(added)
            }
            (b"INCRBY", [key, delta]) => self.incr_by(key, delta),
            (b"DEL", keys) if !keys.is_empty() => {
                let removed = keys.iter().filter_map(|k| self.data.remove(k)).count();
                Frame::Integer(removed as i64)
            }
            (b"EXISTS", keys) if !keys.is_empty() => {
                let found = keys.iter().filter(|k| self.data.contains_key(*k)).count();
                Frame::Integer(found as i64)
            }
            (b"EXPIRE", [key, seconds]) => {
                if parse_int(seconds).is_none() {
                    return not_an_integer();
                }
                Frame::Integer(i64::from(self.data.contains_key(key)))
            }
            (
                b"PING" | b"READONLY" | b"READWRITE" | b"GET" | b"SET" | b"HGET" | b"HSET"
                | b"INCRBY" | b"DEL" | b"EXISTS" | b"EXPIRE",
                _,
            ) => error(format!(
                "ERR wrong number of arguments for '{}' command",
                String::from_utf8_lossy(name).to_lowercase()
            )),
            _ => error(format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(name)
            )),
        }
    }

    fn incr_by(&mut self, key: &Bytes, delta: &[u8]) -> Frame {
        let Some(delta) = parse_int(delta) else {
            return not_an_integer();
        };
        let current = match self.data.get(key) {
            Some(Value::Str(value)) => match parse_int(value) {
                Some(n) => n,
                None => return not_an_integer(),
            },
            Some(Value::Hash(_)) => return wrong_type(),
            None => 0,
        };
        let Some(next) = current.checked_add(delta) else {
            return error("ERR increment or decrement would overflow".to_string());
        };
        self.data
            .insert(key.clone(), Value::Str(Bytes::from(next.to_string())));
        Frame::Integer(next)
    }
}

/// The fake cluster behind [`MockTransport`](super::MockTransport) and the
/// socket-level test nodes.
#[derive(Debug, Default)]
pub struct FakeCluster {
    nodes: Vec<FakeNode>,
}

impl FakeCluster {
    /// Creates a cluster with no nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reachable node serving every key. Adding a known node is a
    /// no-op.
    pub fn add_node(&mut self, address: &NodeAddress) {
        self.node_mut(address);
    }

    /// Returns true if `address` is a known node accepting connections.
    pub fn is_reachable(&self, address: &NodeAddress) -> bool {
        self.node(address).is_some_and(|n| n.reachable)
    }

    /// Makes a node accept or refuse connections. An unreachable node also
    /// fails every send on connections opened earlier.
    pub fn set_reachable(&mut self, address: &NodeAddress, reachable: bool) {
        self.node_mut(address).reachable = reachable;
    }

    /// Makes the next `count` sends to a node fail at the transport level.
    pub fn fail_sends(&mut self, address: &NodeAddress, count: usize) {
        self.node_mut(address).failing_sends = count;
    }

    /// Queues a reply the node returns for its next command, whatever it is.
    pub fn push_reply(&mut self, address: &NodeAddress, reply: Frame) {
        self.node_mut(address).replies.push_back(reply);
    }

    /// Gives a node ownership of a slot range.
    pub fn assign_slots(&mut self, address: &NodeAddress, slots: RangeInclusive<u16>) {
        self.node_mut(address).slots.push(slots);
    }

    /// Moves a slot from its current owner to `to`, replying `MOVED` from
    /// then on. Keys stored on the old owner move along and any migration
    /// of the slot ends.
    pub fn move_slot(&mut self, slot: u16, to: &NodeAddress) {
        let mut moved = Vec::new();
        for node in &mut self.nodes {
            node.migrating.remove(&slot);
            node.importing.remove(&slot);
            if node.owns(slot) {
                node.slots = split_out(&node.slots, slot);
                let keys: Vec<Bytes> = node
                    .data
                    .keys()
                    .filter(|k| key_slot(&String::from_utf8_lossy(k)) == slot)
                    .cloned()
                    .collect();
                for key in keys {
                    if let Some(value) = node.data.remove(&key) {
                        moved.push((key, value));
                    }
                }
            }
        }
        let target = self.node_mut(to);
        target.slots.push(slot..=slot);
        target.data.extend(moved);
    }

    /// Starts migrating `slot` from `from` to `to`: `from` answers `ASK`
    /// for keys it no longer holds and `to` accepts them after `ASKING`.
    pub fn migrate_slot(&mut self, slot: u16, from: &NodeAddress, to: &NodeAddress) {
        self.node_mut(from).migrating.insert(slot, to.clone());
        self.node_mut(to).importing.insert(slot);
    }

    /// Returns the string stored under `key` on a node.
    pub fn stored(&self, address: &NodeAddress, key: &str) -> Option<Bytes> {
        match self.node(address)?.data.get(key.as_bytes()) {
            Some(Value::Str(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Consumes one pending send failure; returns false if the send must
    /// fail.
    pub fn accept_send(&mut self, address: &NodeAddress) -> bool {
        let Some(node) = self.nodes.iter_mut().find(|n| &n.address == address) else {
            return false;
        };
        if !node.reachable {
            return false;
        }
        if node.failing_sends > 0 {
            node.failing_sends -= 1;
            return false;
        }
        true
    }

    /// Produces the reply of the node at `address` to `cmd`.
    pub fn reply(&mut self, address: &NodeAddress, session: &mut Session, cmd: &Cmd) -> Frame {
        let asking = std::mem::take(&mut session.asking);
        let Some(idx) = self.nodes.iter().position(|n| &n.address == address) else {
            return error(format!("ERR unknown node {}", address));
        };
        if let Some(reply) = self.nodes[idx].replies.pop_front() {
            return reply;
        }

        let name = cmd.name().to_ascii_uppercase();
        if name == b"ASKING" {
            session.asking = true;
            return ok();
        }
        if let Some(key) = key_of(&name, cmd) {
            if let Some(redirect) = self.route(idx, key, asking) {
                return redirect;
            }
        }
        self.nodes[idx].execute(&name, cmd.args())
    }

    fn route(&self, idx: usize, key: &Bytes, asking: bool) -> Option<Frame> {
        let node = &self.nodes[idx];
        if !node.is_sharded() {
            return None;
        }

        let slot = key_slot(&String::from_utf8_lossy(key));
        if let Some(target) = node.migrating.get(&slot) {
            if node.data.contains_key(key) {
                return None;
            }
            return Some(error(format!("ASK {} {}", slot, target)));
        }
        if node.owns(slot) || (asking && node.importing.contains(&slot)) {
            return None;
        }

        match self.nodes.iter().find(|n| n.owns(slot)) {
            Some(owner) => Some(error(format!("MOVED {} {}", slot, owner.address))),
            None => Some(error("CLUSTERDOWN Hash slot not served".to_string())),
        }
    }

    fn node(&self, address: &NodeAddress) -> Option<&FakeNode> {
        self.nodes.iter().find(|n| &n.address == address)
    }

    fn node_mut(&mut self, address: &NodeAddress) -> &mut FakeNode {
        let idx = match self.nodes.iter().position(|n| &n.address == address) {
            Some(idx) => idx,
            None => {
                self.nodes.push(FakeNode::new(address.clone()));
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[idx]
    }
}

/// Returns the key argument of single-key data commands.
fn key_of<'c>(name: &[u8], cmd: &'c Cmd) -> Option<&'c Bytes> {
    match name {
        b"GET" | b"SET" | b"HGET" | b"HSET" | b"INCRBY" | b"DEL" | b"EXISTS" | b"EXPIRE" => {
            cmd.args().first()
        }
        _ => None,
    }
}

/// Removes one slot from a list of ranges.
fn split_out(ranges: &[RangeInclusive<u16>], slot: u16) -> Vec<RangeInclusive<u16>> {
    let mut out = Vec::new();
    for range in ranges {
        if !range.contains(&slot) {
            out.push(range.clone());
            continue;
        }
        if *range.start() < slot {
            out.push(*range.start()..=slot - 1);
        }
        if slot < *range.end() {
            out.push(slot + 1..=*range.end());
        }
    }
    out
}

fn parse_int(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn ok() -> Frame {
    Frame::SimpleString(b"OK".to_vec())
}

fn error(message: String) -> Frame {
    Frame::Error(message.into_bytes())
}

fn wrong_type() -> Frame {
    error("WRONGTYPE Operation against a key holding the wrong kind of value".to_string())
}

fn not_an_integer() -> Frame {
    error("ERR value is not an integer or out of range".to_string())
}
