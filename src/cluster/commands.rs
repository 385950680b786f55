//! Cluster administrative command builders.
//!
//! These commands carry no key and are never routed by slot; they go to
//! whichever node the ring cursor points at.

use crate::core::command::Cmd;

/// Creates an ASKING command.
///
/// Sent before retrying a command that received an ASK redirect. It tells
/// the target node to accept the next command even though the slot is still
/// being migrated to it. The flag only affects the immediately following
/// command on that connection.
pub fn asking() -> Cmd {
    Cmd::new("ASKING")
}

/// Creates a READONLY command, allowing reads from a replica on this
/// connection.
pub fn readonly() -> Cmd {
    Cmd::new("READONLY")
}

/// Creates a READWRITE command, undoing READONLY.
pub fn readwrite() -> Cmd {
    Cmd::new("READWRITE")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::frame::Frame;
    use bytes::Bytes;

    fn single_word(cmd: Cmd, word: &'static str) {
        assert!(cmd.args().is_empty());
        match cmd.to_frame() {
            Frame::Array(arr) => {
                assert_eq!(arr, vec![Frame::BulkString(Some(Bytes::from(word)))]);
            }
            other => panic!("Expected Array frame, got {:?}", other),
        }
    }

    #[test]
    fn test_asking_cmd() {
        single_word(asking(), "ASKING");
    }

    #[test]
    fn test_readonly_cmd() {
        single_word(readonly(), "READONLY");
    }

    #[test]
    fn test_readwrite_cmd() {
        single_word(readwrite(), "READWRITE");
    }
}
