use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::proto::codec::{Decoder, Encoder};
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// A single request/response connection to one cluster node.
///
/// Wraps an underlying stream and handles RESP frame encoding and decoding.
/// Every write and every read is bounded by the configured timeout; a
/// connection that returns an error must be treated as dead and dropped.
pub struct Connection<S> {
    stream: S,
    decoder: Decoder,
    encoder: Encoder,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection with no timeouts configured.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            encoder: Encoder::new(),
            read_timeout: None,
            write_timeout: None,
        }
    }

    /// Configures read and write timeouts for this connection.
    ///
    /// # Arguments
    ///
    /// * `read_timeout` - Optional limit for waiting on a reply
    /// * `write_timeout` - Optional limit for flushing a request
    pub fn with_timeouts(
        mut self,
        read_timeout: Option<Duration>,
        write_timeout: Option<Duration>,
    ) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }

    /// Writes a frame to the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the write fails and [`Error::Timeout`] if it
    /// does not finish within the write timeout.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.encoder.encode(frame);
        let data = self.encoder.take();
        let limit = self.write_timeout;
        let write = self.stream.write_all(&data);
        match limit {
            Some(limit) => timeout(limit, write).await.map_err(|_| Error::Timeout {
                operation: "write",
                elapsed: limit,
            })??,
            None => write.await?,
        }
        Ok(())
    }

    /// Reads one complete frame from the connection.
    ///
    /// Partial reads are buffered internally until a whole frame arrives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the peer closed the connection or sent
    /// malformed data, [`Error::Timeout`] if no complete frame arrives within
    /// the read timeout.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let limit = self.read_timeout;
        match limit {
            Some(limit) => timeout(limit, self.read_frame_inner())
                .await
                .map_err(|_| Error::Timeout {
                    operation: "read",
                    elapsed: limit,
                })?,
            None => self.read_frame_inner().await,
        }
    }

    /// Sends a request frame and waits for its reply.
    pub async fn request(&mut self, frame: &Frame) -> Result<Frame> {
        self.write_frame(frame).await?;
        self.read_frame().await
    }

    async fn read_frame_inner(&mut self) -> Result<Frame> {
        let mut buf = [0u8; 4096];
        loop {
            match self.decoder.decode() {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {
                    let n = self.stream.read(&mut buf).await?;
                    if n == 0 {
                        return Err(Error::Protocol {
                            message: "connection closed".to_string(),
                        });
                    }
                    self.decoder.append(&buf[..n]);
                }
                Err(message) => return Err(Error::Protocol { message }),
            }
        }
    }
}

impl<S> fmt::Debug for Connection<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("stream", &self.stream)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
