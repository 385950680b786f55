use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for shardwalk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a cluster.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An IO error occurred.
    #[error("IO error: {source}")]
    Io {
        /// The underlying IO error.
        #[from]
        source: io::Error,
    },

    /// A protocol error occurred.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the error.
        message: String,
    },

    /// The server returned an error that is not a cluster redirect.
    #[error("server error: {message}")]
    Server {
        /// Error message from server, verbatim.
        message: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of invalid argument.
        message: String,
    },

    /// The seed hostname could not be resolved to any address.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        /// The hostname that was looked up.
        host: String,
        /// The underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// A single node refused or dropped the connection attempt.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// The node address (host:port).
        address: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A connect, read or write did not complete in time.
    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        /// Which step timed out ("connect", "read" or "write").
        operation: &'static str,
        /// The configured limit that was exceeded.
        elapsed: Duration,
    },

    /// Every node in the ring failed during one full traversal.
    ///
    /// Fatal for the operation in flight only; the client can be used again
    /// once the cluster recovers.
    #[error("all {attempted} cluster nodes are unreachable")]
    AllNodesUnreachable {
        /// Number of nodes that were tried.
        attempted: usize,
    },

    /// The cluster kept redirecting the command past the configured bound.
    #[error("command redirected more than {limit} times")]
    TooManyRedirects {
        /// The configured redirect limit.
        limit: usize,
    },
}

impl Error {
    /// Builds a server error from a raw error reply payload.
    pub(crate) fn server(message: &[u8]) -> Self {
        Error::Server {
            message: String::from_utf8_lossy(message).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let error = Error::Io { source: io_err };
        assert!(error.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_display_protocol() {
        let error = Error::Protocol {
            message: "invalid frame".to_string(),
        };
        assert_eq!(error.to_string(), "protocol error: invalid frame");
    }

    #[test]
    fn test_error_display_server() {
        let error = Error::server(b"WRONGTYPE Operation against a key holding the wrong kind of value");
        assert_eq!(
            error.to_string(),
            "server error: WRONGTYPE Operation against a key holding the wrong kind of value"
        );
    }

    #[test]
    fn test_error_display_invalid_argument() {
        let error = Error::InvalidArgument {
            message: "missing required field".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "invalid argument: missing required field"
        );
    }

    #[test]
    fn test_error_display_connect() {
        let error = Error::Connect {
            address: "10.0.0.1:7000".to_string(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(error.to_string(), "failed to connect to 10.0.0.1:7000: refused");
    }

    #[test]
    fn test_error_display_timeout() {
        let error = Error::Timeout {
            operation: "read",
            elapsed: Duration::from_secs(10),
        };
        assert_eq!(error.to_string(), "read timed out after 10s");
    }

    #[test]
    fn test_error_display_all_nodes_unreachable() {
        let error = Error::AllNodesUnreachable { attempted: 3 };
        assert_eq!(error.to_string(), "all 3 cluster nodes are unreachable");
    }

    #[test]
    fn test_error_display_too_many_redirects() {
        let error = Error::TooManyRedirects { limit: 16 };
        assert_eq!(error.to_string(), "command redirected more than 16 times");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let error: Error = io_err.into();
        assert!(matches!(error, Error::Io { .. }));
    }
}
