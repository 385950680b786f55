//! The wire transport used by the cluster dispatcher.
//!
//! The dispatcher never touches sockets directly. It resolves seeds, opens
//! connections and exchanges one command for one reply through a
//! [`Transport`], which lets the routing engine run over real TCP
//! ([`TcpTransport`]) or over an in-memory cluster in tests.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use crate::core::command::Cmd;
use crate::core::connection::Connection;
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// Address of a cluster node.
///
/// Two nodes are the same node exactly when host and port are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    /// Creates a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the host (IP literal or hostname, without brackets).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl From<SocketAddr> for NodeAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for NodeAddress {
    type Err = Error;

    /// Parses `host:port`, `ip:port` or `[ipv6]:port`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidArgument {
            message: format!("invalid node address: {:?}", s),
        };

        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or_else(invalid)?,
            None => host,
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Time limits applied to every node connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit for establishing a connection.
    pub connect: Duration,
    /// Limit for receiving a complete reply.
    pub read: Duration,
    /// Limit for writing a request.
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            read: Duration::from_secs(10),
            write: Duration::from_secs(10),
        }
    }
}

/// The request/response transport a cluster client runs on.
///
/// Any error returned by [`send`](Transport::send) is treated as a transport
/// failure: the connection is discarded and the command is retried on
/// another node. Error *replies* from the store are not errors here; they
/// come back as [`Frame::Error`].
pub trait Transport {
    /// A live connection to a single node.
    type Connection: Send;

    /// Expands a seed host into the addresses of candidate nodes.
    fn resolve(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Vec<NodeAddress>>> + Send;

    /// Opens a connection to one node.
    fn connect(
        &self,
        address: &NodeAddress,
        timeouts: &Timeouts,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;

    /// Sends one command and waits for its reply.
    fn send(
        &self,
        connection: &mut Self::Connection,
        cmd: &Cmd,
    ) -> impl Future<Output = Result<Frame>> + Send;

    /// Closes a connection that is no longer wanted.
    fn close(&self, connection: Self::Connection) {
        drop(connection);
    }
}

/// RESP over plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl Transport for TcpTransport {
    type Connection = Connection<TcpStream>;

    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<NodeAddress>> {
        let addrs = lookup_host((host, port))
            .await
            .map_err(|source| Error::Resolve {
                host: host.to_string(),
                source,
            })?;
        Ok(addrs.map(NodeAddress::from).collect())
    }

    async fn connect(
        &self,
        address: &NodeAddress,
        timeouts: &Timeouts,
    ) -> Result<Self::Connection> {
        debug!(%address, "opening connection");
        let stream = timeout(
            timeouts.connect,
            TcpStream::connect((address.host(), address.port())),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: "connect",
            elapsed: timeouts.connect,
        })?
        .map_err(|source| Error::Connect {
            address: address.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;

        Ok(Connection::new(stream).with_timeouts(Some(timeouts.read), Some(timeouts.write)))
    }

    async fn send(&self, connection: &mut Self::Connection, cmd: &Cmd) -> Result<Frame> {
        connection.request(&cmd.to_frame()).await
    }
}
