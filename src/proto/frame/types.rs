use bytes::Bytes;

/// A RESP (Redis Serialization Protocol) frame.
///
/// This is the typed reply a node hands back for every command:
/// - SimpleString: Status responses like "OK"
/// - Error: Error responses, including cluster redirects
/// - Integer: Numeric responses
/// - BulkString: Binary-safe string data
/// - Array: Command arguments and array responses
/// - Null: NULL value
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (+OK).
    SimpleString(Vec<u8>),
    /// Error (-ERR).
    Error(Vec<u8>),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar).
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...).
    Array(Vec<Frame>),
    /// Null ($-1 or *-1).
    Null,
}

impl Frame {
    /// Returns the error payload if this is an error reply.
    pub fn error_message(&self) -> Option<&[u8]> {
        match self {
            Frame::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if this frame is an error reply.
    pub fn is_error(&self) -> bool {
        matches!(self, Frame::Error(_))
    }

    /// Returns true if this is the `+OK` status reply.
    pub fn is_ok_status(&self) -> bool {
        matches!(self, Frame::SimpleString(s) if s.as_slice() == b"OK")
    }

    /// Returns true if this frame is Null.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null | Frame::BulkString(None))
    }
}
