use bytes::{Buf, Bytes, BytesMut};

use crate::proto::frame::Frame;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024; // 512 MB default
const MAX_NESTING_DEPTH: usize = 32;

/// Outcome of parsing at one offset.
enum Parsed {
    /// A whole frame and the offset just past its end.
    Frame(Frame, usize),
    /// The buffer must grow to at least this many bytes before the frame
    /// can complete.
    Incomplete(usize),
}

/// A RESP decoder that converts bytes to [`Frame`] values.
///
/// The decoder handles streaming input. Call [`append`](Decoder::append) to
/// add data, then [`decode`](Decoder::decode) to parse frames. `Ok(None)`
/// means more data is needed; the buffer is only consumed once a whole frame
/// is available.
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
    /// Buffer length below which the pending frame cannot be complete.
    needed: usize,
}

impl Decoder {
    /// Creates a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a new decoder with a custom maximum frame size.
    ///
    /// # Arguments
    ///
    /// * `max_frame_size` - Maximum size in bytes for a single frame
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
            needed: 0,
        }
    }

    /// Appends raw bytes read from the network.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Attempts to decode one frame from the buffer.
    ///
    /// Returns `Ok(Some(Frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed and `Err(...)` if the data is
    /// malformed.
    pub fn decode(&mut self) -> Result<Option<Frame>, String> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        if self.buf.len() > self.max_frame_size {
            return Err("buffer size exceeded maximum frame size".to_string());
        }

        if self.buf.len() < self.needed {
            return Ok(None);
        }

        match self.parse(0, 0)? {
            Parsed::Frame(frame, consumed) => {
                self.buf.advance(consumed);
                self.needed = 0;
                Ok(Some(frame))
            }
            Parsed::Incomplete(needed) => {
                self.needed = needed;
                Ok(None)
            }
        }
    }

    /// Parses the frame starting at `pos`, returning it together with the
    /// offset just past its end.
    fn parse(&self, pos: usize, depth: usize) -> Result<Parsed, String> {
        let more = Parsed::Incomplete(self.buf.len() + 1);
        let Some(&tag) = self.buf.get(pos) else {
            return Ok(more);
        };
        let Some(end) = self.find_crlf(pos + 1) else {
            return Ok(more);
        };
        let line = &self.buf[pos + 1..end];
        let next = end + 2;

        match tag {
            b'+' => Ok(Parsed::Frame(Frame::SimpleString(line.to_vec()), next)),
            b'-' => Ok(Parsed::Frame(Frame::Error(line.to_vec()), next)),
            b':' => Ok(Parsed::Frame(Frame::Integer(parse_int(line)?), next)),
            b'$' => {
                let len = parse_int(line)?;
                if len == -1 {
                    return Ok(Parsed::Frame(Frame::BulkString(None), next));
                }
                let len = usize::try_from(len)
                    .map_err(|_| format!("invalid bulk string length: {}", len))?;

                if len > self.max_frame_size {
                    return Err("bulk string length exceeds maximum frame size".to_string());
                }

                if self.buf.len() < next + len + 2 {
                    return Ok(Parsed::Incomplete(next + len + 2));
                }
                if &self.buf[next + len..next + len + 2] != b"\r\n" {
                    return Err("bulk string is not terminated by CRLF".to_string());
                }

                let data = Bytes::copy_from_slice(&self.buf[next..next + len]);
                Ok(Parsed::Frame(Frame::BulkString(Some(data)), next + len + 2))
            }
            b'*' => {
                let len = parse_int(line)?;
                if len == -1 {
                    return Ok(Parsed::Frame(Frame::Null, next));
                }
                let len =
                    usize::try_from(len).map_err(|_| format!("invalid array length: {}", len))?;

                // Assume minimum 16 bytes per item
                if len > self.max_frame_size / 16 {
                    return Err("array length exceeds reasonable maximum".to_string());
                }

                if len > 0 && depth >= MAX_NESTING_DEPTH {
                    return Err(format!("arrays nested deeper than {}", MAX_NESTING_DEPTH));
                }

                let mut items = Vec::with_capacity(len.min(1024));
                let mut cursor = next;
                for _ in 0..len {
                    match self.parse(cursor, depth + 1)? {
                        Parsed::Frame(frame, after) => {
                            items.push(frame);
                            cursor = after;
                        }
                        incomplete => return Ok(incomplete),
                    }
                }
                Ok(Parsed::Frame(Frame::Array(items), cursor))
            }
            other => Err(format!("unknown frame type: {}", other as char)),
        }
    }

    /// Returns the index of the next CRLF at or after `from`.
    fn find_crlf(&self, from: usize) -> Option<usize> {
        self.buf[from..]
            .windows(2)
            .position(|w| w == b"\r\n")
            .map(|i| from + i)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_int(line: &[u8]) -> Result<i64, String> {
    std::str::from_utf8(line)
        .map_err(|e| e.to_string())?
        .parse::<i64>()
        .map_err(|e| e.to_string())
}
