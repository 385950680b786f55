//! Cluster slot calculation.
//!
//! Keys map to one of 16384 slots through CRC16 (XMODEM variant), honoring
//! `{...}` hash tags so related keys can be forced onto the same slot.

use crc::{Crc, CRC_16_XMODEM};

/// Number of hash slots in a cluster.
pub const SLOT_COUNT: u16 = 16384;

/// Mask selecting the low 14 bits of the checksum.
const SLOT_MASK: u16 = SLOT_COUNT - 1;

/// CRC-16/XMODEM: polynomial 0x1021, initial value 0, table driven.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Calculates the cluster slot for a given key.
///
/// If the key contains `{...}` with a non-empty body, only the body is
/// hashed (hash tags).
///
/// # Examples
///
/// ```
/// use shardwalk::key_slot;
///
/// assert_eq!(key_slot("foo"), 12182);
/// assert_eq!(key_slot("{user1000}.following"), key_slot("{user1000}.followers"));
/// ```
pub fn key_slot(key: &str) -> u16 {
    let hash_key = extract_hash_tag(key);
    CRC16.checksum(hash_key.as_bytes()) & SLOT_MASK
}

/// Extracts the hash tag from a key.
///
/// - `{user1000}.following` → `user1000`
/// - `foo{bar}baz` → `bar`
/// - `foo{}{bar}` → whole key (the first `{...}` is empty)
/// - `foo` → whole key
fn extract_hash_tag(key: &str) -> &str {
    if let Some(start) = key.find('{') {
        if let Some(len) = key[start + 1..].find('}') {
            if len > 0 {
                return &key[start + 1..start + 1 + len];
            }
        }
    }

    key
}
