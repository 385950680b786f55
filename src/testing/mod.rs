//! Test support: an in-memory transport over a fake cluster.
//!
//! [`MockTransport`] lets the routing engine run without sockets. Clones
//! share state, so a test keeps one handle to script the cluster and inspect
//! what was connected, sent and closed while the client owns another.
//!
//! ```
//! use shardwalk::testing::MockTransport;
//! use shardwalk::{ClientBuilder, NodeAddress};
//!
//! # #[tokio::main]
//! # async fn main() -> shardwalk::Result<()> {
//! let node = NodeAddress::new("10.0.0.1", 7000);
//! let mock = MockTransport::new();
//! mock.add_node(&node);
//!
//! let mut client = ClientBuilder::new()
//!     .seed("10.0.0.1", 7000)
//!     .build_with_transport(mock.clone())
//!     .await?;
//! client.set("greeting", "hello").await?;
//! assert_eq!(mock.sent_to(&node), vec!["SET greeting hello"]);
//! # Ok(())
//! # }
//! ```

mod cluster;

use std::collections::HashMap;
use std::io;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

pub use cluster::{FakeCluster, Session};

use crate::core::command::Cmd;
use crate::core::transport::{NodeAddress, Timeouts, Transport};
use crate::proto::frame::Frame;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MockState {
    cluster: FakeCluster,
    resolved: HashMap<(String, u16), Vec<NodeAddress>>,
    connects: Vec<NodeAddress>,
    sent: Vec<(NodeAddress, String)>,
    closed: Vec<NodeAddress>,
}

/// A [`Transport`] backed by a [`FakeCluster`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// A connection opened by [`MockTransport`].
#[derive(Debug)]
pub struct MockConnection {
    address: NodeAddress,
    session: Session,
}

impl MockConnection {
    /// Returns the node this connection talks to.
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }
}

impl MockTransport {
    /// Creates a transport over an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a reachable node serving every key.
    pub fn add_node(&self, address: &NodeAddress) {
        self.lock().cluster.add_node(address);
    }

    /// Makes a node accept or refuse connections.
    pub fn set_reachable(&self, address: &NodeAddress, reachable: bool) {
        self.lock().cluster.set_reachable(address, reachable);
    }

    /// Makes the next `count` sends to a node fail with an IO error.
    pub fn fail_sends(&self, address: &NodeAddress, count: usize) {
        self.lock().cluster.fail_sends(address, count);
    }

    /// Queues a reply a node returns for its next command.
    pub fn push_reply(&self, address: &NodeAddress, reply: Frame) {
        self.lock().cluster.push_reply(address, reply);
    }

    /// Queues an error reply a node returns for its next command.
    pub fn push_error(&self, address: &NodeAddress, message: &str) {
        self.push_reply(address, Frame::Error(message.as_bytes().to_vec()));
    }

    /// Gives a node ownership of a slot range.
    pub fn assign_slots(&self, address: &NodeAddress, slots: RangeInclusive<u16>) {
        self.lock().cluster.assign_slots(address, slots);
    }

    /// Hands a slot over to another node.
    pub fn move_slot(&self, slot: u16, to: &NodeAddress) {
        self.lock().cluster.move_slot(slot, to);
    }

    /// Starts migrating a slot between two nodes.
    pub fn migrate_slot(&self, slot: u16, from: &NodeAddress, to: &NodeAddress) {
        self.lock().cluster.migrate_slot(slot, from, to);
    }

    /// Makes `resolve(host, port)` return `addresses` instead of the seed
    /// itself.
    pub fn resolve_to(&self, host: &str, port: u16, addresses: Vec<NodeAddress>) {
        self.lock()
            .resolved
            .insert((host.to_string(), port), addresses);
    }

    /// Returns the string stored under `key` on a node.
    pub fn stored(&self, address: &NodeAddress, key: &str) -> Option<Bytes> {
        self.lock().cluster.stored(address, key)
    }

    /// Returns every connect attempt, successful or not, in order.
    pub fn connect_attempts(&self) -> Vec<NodeAddress> {
        self.lock().connects.clone()
    }

    /// Returns every command sent, as `(node, "NAME arg ...")`, in order.
    pub fn sent(&self) -> Vec<(NodeAddress, String)> {
        self.lock().sent.clone()
    }

    /// Returns the commands sent to one node.
    pub fn sent_to(&self, address: &NodeAddress) -> Vec<String> {
        self.lock()
            .sent
            .iter()
            .filter(|(to, _)| to == address)
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }

    /// Returns the nodes whose connections were closed, in order.
    pub fn closed(&self) -> Vec<NodeAddress> {
        self.lock().closed.clone()
    }

    /// Forgets recorded connects, sends and closes.
    pub fn clear_logs(&self) {
        let mut state = self.lock();
        state.connects.clear();
        state.sent.clear();
        state.closed.clear();
    }
}

fn describe(cmd: &Cmd) -> String {
    let mut line = String::from_utf8_lossy(cmd.name()).into_owned();
    for arg in cmd.args() {
        line.push(' ');
        line.push_str(&String::from_utf8_lossy(arg));
    }
    line
}

impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<NodeAddress>> {
        let state = self.lock();
        Ok(state
            .resolved
            .get(&(host.to_string(), port))
            .cloned()
            .unwrap_or_else(|| vec![NodeAddress::new(host, port)]))
    }

    async fn connect(&self, address: &NodeAddress, _timeouts: &Timeouts) -> Result<MockConnection> {
        let mut state = self.lock();
        state.connects.push(address.clone());
        if !state.cluster.is_reachable(address) {
            return Err(Error::Connect {
                address: address.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            });
        }
        Ok(MockConnection {
            address: address.clone(),
            session: Session::default(),
        })
    }

    async fn send(&self, connection: &mut MockConnection, cmd: &Cmd) -> Result<Frame> {
        let mut state = self.lock();
        state.sent.push((connection.address.clone(), describe(cmd)));
        if !state.cluster.accept_send(&connection.address) {
            return Err(Error::Io {
                source: io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"),
            });
        }
        Ok(state
            .cluster
            .reply(&connection.address, &mut connection.session, cmd))
    }

    fn close(&self, connection: MockConnection) {
        self.lock().closed.push(connection.address);
    }
}
