use std::time::Duration;

use crate::cluster::ClusterClient;
use crate::core::transport::{TcpTransport, Timeouts, Transport};
use crate::Error;

/// Default number of redirect hops a single command may take.
pub const DEFAULT_MAX_REDIRECTS: usize = 16;

/// Default port used when an address omits one.
const DEFAULT_PORT: u16 = 6379;

/// Settings for a [`ClusterClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ClusterConfig {
    /// Connect, read and write limits for every node connection.
    pub timeouts: Timeouts,
    /// Redirect hops allowed per command; `None` follows redirects forever.
    pub max_redirects: Option<usize>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            max_redirects: Some(DEFAULT_MAX_REDIRECTS),
        }
    }
}

/// Builder for configuring and creating a [`ClusterClient`].
///
/// # Example
///
/// ```no_run
/// use shardwalk::ClientBuilder;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new()
///     .address("redis://cluster.internal:7000")
///     .connection_timeout(Duration::from_secs(2))
///     .max_redirects(Some(8))
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    address: Option<String>,
    seed: Option<(String, u16)>,
    connection_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    max_redirects: Option<Option<usize>>,
}

impl ClientBuilder {
    /// Creates a new [`ClientBuilder`] instance.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the seed address as a URL.
    ///
    /// Accepts `redis://host:port` or a bare `host:port`; the port defaults
    /// to 6379.
    #[inline]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the seed host and port directly. Takes precedence over
    /// [`address`](ClientBuilder::address).
    #[inline]
    pub fn seed(mut self, host: impl Into<String>, port: u16) -> Self {
        self.seed = Some((host.into(), port));
        self
    }

    /// Sets the connection timeout.
    #[inline]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Sets the read timeout for replies.
    #[inline]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the write timeout for requests.
    #[inline]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Sets the redirect bound per command. `None` removes the bound.
    #[inline]
    pub fn max_redirects(mut self, limit: Option<usize>) -> Self {
        self.max_redirects = Some(limit);
        self
    }

    /// Returns the configuration this builder describes.
    pub fn config(&self) -> ClusterConfig {
        let defaults = ClusterConfig::default();
        ClusterConfig {
            timeouts: Timeouts {
                connect: self.connection_timeout.unwrap_or(defaults.timeouts.connect),
                read: self.read_timeout.unwrap_or(defaults.timeouts.read),
                write: self.write_timeout.unwrap_or(defaults.timeouts.write),
            },
            max_redirects: self.max_redirects.unwrap_or(defaults.max_redirects),
        }
    }

    /// Connects over TCP.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if no usable seed is set,
    /// [`Error::Resolve`] if the seed host does not resolve and
    /// [`Error::AllNodesUnreachable`] if no resolved node accepts a connection.
    #[inline]
    pub async fn build(self) -> Result<ClusterClient<TcpTransport>, Error> {
        self.build_with_transport(TcpTransport).await
    }

    /// Connects over the given transport.
    pub async fn build_with_transport<T: Transport>(
        self,
        transport: T,
    ) -> Result<ClusterClient<T>, Error> {
        let config = self.config();
        let (host, port) = self.into_seed()?;
        ClusterClient::connect_with(transport, &host, port, config).await
    }

    fn into_seed(self) -> Result<(String, u16), Error> {
        if let Some(seed) = self.seed {
            return Ok(seed);
        }

        let address = self.address.ok_or_else(|| Error::InvalidArgument {
            message: "address is required".to_string(),
        })?;
        parse_seed_url(&address)
    }
}

/// Parses a seed URL into host and port.
fn parse_seed_url(address: &str) -> Result<(String, u16), Error> {
    let with_scheme = if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    };

    let parsed = url::Url::parse(&with_scheme).map_err(|_| Error::InvalidArgument {
        message: "invalid address format".to_string(),
    })?;

    if parsed.scheme() != "redis" {
        return Err(Error::InvalidArgument {
            message: "invalid scheme, expected redis://".to_string(),
        });
    }

    let host = parsed.host_str().ok_or_else(|| Error::InvalidArgument {
        message: "missing host in address".to_string(),
    })?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    Ok((host.to_string(), parsed.port().unwrap_or(DEFAULT_PORT)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_new() {
        let builder = ClientBuilder::new();
        assert!(builder.address.is_none());
        assert!(builder.seed.is_none());
    }

    #[test]
    fn test_default_config() {
        let config = ClusterConfig::default();
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
        assert_eq!(config.timeouts.read, Duration::from_secs(10));
        assert_eq!(config.timeouts.write, Duration::from_secs(10));
        assert_eq!(config.max_redirects, Some(DEFAULT_MAX_REDIRECTS));
    }

    #[test]
    fn test_builder_chaining() {
        let config = ClientBuilder::new()
            .address("redis://localhost:7000")
            .connection_timeout(Duration::from_secs(1))
            .read_timeout(Duration::from_secs(2))
            .write_timeout(Duration::from_secs(3))
            .max_redirects(None)
            .config();

        assert_eq!(config.timeouts.connect, Duration::from_secs(1));
        assert_eq!(config.timeouts.read, Duration::from_secs(2));
        assert_eq!(config.timeouts.write, Duration::from_secs(3));
        assert_eq!(config.max_redirects, None);
    }

    #[test]
    fn test_parse_seed_url_with_scheme() {
        assert_eq!(
            parse_seed_url("redis://127.0.0.1:7000").unwrap(),
            ("127.0.0.1".to_string(), 7000)
        );
    }

    #[test]
    fn test_parse_seed_url_without_scheme() {
        assert_eq!(
            parse_seed_url("cluster.internal:7001").unwrap(),
            ("cluster.internal".to_string(), 7001)
        );
    }

    #[test]
    fn test_parse_seed_url_default_port() {
        assert_eq!(
            parse_seed_url("redis://localhost").unwrap(),
            ("localhost".to_string(), 6379)
        );
    }

    #[test]
    fn test_parse_seed_url_ipv6() {
        assert_eq!(
            parse_seed_url("redis://[::1]:7000").unwrap(),
            ("::1".to_string(), 7000)
        );
    }

    #[test]
    fn test_parse_seed_url_rejects_other_schemes() {
        assert!(matches!(
            parse_seed_url("rediss://localhost:7000"),
            Err(Error::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_seed_url("http://localhost:7000"),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_seed_takes_precedence_over_address() {
        let builder = ClientBuilder::new()
            .address("redis://ignored:1")
            .seed("10.0.0.1", 7000);
        assert_eq!(
            builder.into_seed().unwrap(),
            ("10.0.0.1".to_string(), 7000)
        );
    }

    #[tokio::test]
    async fn test_builder_build_without_address() {
        let result = ClientBuilder::new().build().await;
        match result {
            Err(Error::InvalidArgument { message }) => {
                assert_eq!(message, "address is required");
            }
            _ => panic!("Expected InvalidArgument error"),
        }
    }
}
