//! Parsing of cluster redirect replies.
//!
//! A node that does not serve the slot of a command answers with an error
//! reply naming the node that does:
//! - `MOVED <slot> <host>:<port>` - the slot has a new permanent owner
//! - `ASK <slot> <host>:<port>` - the slot is migrating; retry once there

use crate::cluster::slot::SLOT_COUNT;
use crate::core::transport::NodeAddress;

/// A redirect issued by a cluster node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Permanent redirect: the slot now lives at `address`.
    Moved {
        /// The slot number (0-16383).
        slot: u16,
        /// The node owning this slot.
        address: NodeAddress,
    },
    /// One-shot redirect during migration. The command must be preceded by
    /// `ASKING` on the target and routing must not change.
    Ask {
        /// The slot number (0-16383).
        slot: u16,
        /// The node temporarily handling this slot.
        address: NodeAddress,
    },
}

impl Redirect {
    /// Returns the slot named by the redirect.
    pub fn slot(&self) -> u16 {
        match self {
            Redirect::Moved { slot, .. } | Redirect::Ask { slot, .. } => *slot,
        }
    }

    /// Returns the target node.
    pub fn address(&self) -> &NodeAddress {
        match self {
            Redirect::Moved { address, .. } | Redirect::Ask { address, .. } => address,
        }
    }

    /// Returns true for an ASK redirect.
    pub fn is_ask(&self) -> bool {
        matches!(self, Redirect::Ask { .. })
    }
}

/// Parses an error reply payload as a redirect.
///
/// Returns `None` for any other error, including a `MOVED`/`ASK` reply whose
/// slot or address cannot be parsed; such replies are ordinary errors for the
/// caller.
pub fn parse_redirect(error_msg: &[u8]) -> Option<Redirect> {
    let msg = std::str::from_utf8(error_msg).ok()?.trim();

    if let Some(args) = msg.strip_prefix("MOVED ") {
        let (slot, address) = parse_redirect_args(args)?;
        return Some(Redirect::Moved { slot, address });
    }

    if let Some(args) = msg.strip_prefix("ASK ") {
        let (slot, address) = parse_redirect_args(args)?;
        return Some(Redirect::Ask { slot, address });
    }

    None
}

/// Parses redirect arguments: "<slot> <host>:<port>"
fn parse_redirect_args(args: &str) -> Option<(u16, NodeAddress)> {
    let mut parts = args.split_whitespace();
    let slot: u16 = parts.next()?.parse().ok()?;
    let address: NodeAddress = parts.next()?.parse().ok()?;

    if parts.next().is_some() || slot >= SLOT_COUNT {
        return None;
    }

    Some((slot, address))
}
