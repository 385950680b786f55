use crate::proto::frame::Frame;
use crate::Error;
use bytes::Bytes;

/// A command ready to be sent to a cluster node.
///
/// A command is its name followed by an ordered list of arguments. It is
/// kept by value so the dispatcher can resubmit the very same command after a
/// redirect or a failover.
///
/// # Example
///
/// ```
/// use shardwalk::Cmd;
///
/// let cmd = Cmd::new("SET").arg("key").arg("value");
/// assert_eq!(cmd.name(), b"SET".as_slice());
/// assert_eq!(cmd.args().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Cmd {
    args: Vec<Bytes>,
}

impl Cmd {
    /// Creates a new command with the given name.
    ///
    /// # Arguments
    ///
    /// * `name` - The command name (e.g., "GET", "SET", "DEL")
    #[inline]
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Appends an argument to the command.
    #[inline]
    pub fn arg<T: Into<Bytes>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Returns the command name.
    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.args[0]
    }

    /// Returns the arguments following the command name.
    #[inline]
    pub fn args(&self) -> &[Bytes] {
        &self.args[1..]
    }

    /// Builds the RESP array frame for this command without consuming it.
    pub fn to_frame(&self) -> Frame {
        Frame::Array(
            self.args
                .iter()
                .map(|b| Frame::BulkString(Some(b.clone())))
                .collect(),
        )
    }
}

/// Creates a GET command.
#[inline]
pub fn get(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("GET").arg(key)
}

/// Creates a SET command.
#[inline]
pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("SET").arg(key).arg(value)
}

/// Creates an HGET command.
#[inline]
pub fn hget(key: impl Into<Bytes>, field: impl Into<Bytes>) -> Cmd {
    Cmd::new("HGET").arg(key).arg(field)
}

/// Creates an HSET command for a single field.
#[inline]
pub fn hset(key: impl Into<Bytes>, field: impl Into<Bytes>, value: impl Into<Bytes>) -> Cmd {
    Cmd::new("HSET").arg(key).arg(field).arg(value)
}

/// Creates an EXPIRE command.
#[inline]
pub fn expire(key: impl Into<Bytes>, seconds: u64) -> Cmd {
    Cmd::new("EXPIRE").arg(key).arg(seconds.to_string())
}

/// Creates an INCRBY command.
#[inline]
pub fn incr_by(key: impl Into<Bytes>, amount: i64) -> Cmd {
    Cmd::new("INCRBY").arg(key).arg(amount.to_string())
}

/// Creates a DEL command for a single key.
#[inline]
pub fn del(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("DEL").arg(key)
}

/// Creates an EXISTS command for a single key.
#[inline]
pub fn exists(key: impl Into<Bytes>) -> Cmd {
    Cmd::new("EXISTS").arg(key)
}

/// Converts a GET-style reply to optional bytes.
#[inline]
pub fn frame_to_bytes(frame: Frame) -> Result<Option<Bytes>, Error> {
    match frame {
        Frame::BulkString(b) => Ok(b),
        Frame::Null => Ok(None),
        Frame::Error(e) => Err(Error::server(&e)),
        _ => Err(Error::Protocol {
            message: "unexpected frame type".to_string(),
        }),
    }
}

/// Converts an integer reply.
#[inline]
pub fn frame_to_int(frame: Frame) -> Result<i64, Error> {
    match frame {
        Frame::Integer(i) => Ok(i),
        Frame::Error(e) => Err(Error::server(&e)),
        _ => Err(Error::Protocol {
            message: "expected integer frame".to_string(),
        }),
    }
}

/// Converts a counting integer reply to a boolean: `true` when the count is
/// positive.
///
/// Used for HSET (field newly created), EXPIRE (timeout set), DEL (key
/// removed) and EXISTS.
#[inline]
pub fn frame_to_bool(frame: Frame) -> Result<bool, Error> {
    frame_to_int(frame).map(|n| n > 0)
}

/// Converts a status reply: `+OK` is `true`, a null reply (condition not
/// met) is `false`.
#[inline]
pub fn frame_to_ok(frame: Frame) -> Result<bool, Error> {
    match frame {
        Frame::SimpleString(ref s) => Ok(s.as_slice() == b"OK"),
        Frame::Null | Frame::BulkString(None) => Ok(false),
        Frame::Error(e) => Err(Error::server(&e)),
        _ => Err(Error::Protocol {
            message: "expected status frame".to_string(),
        }),
    }
}
