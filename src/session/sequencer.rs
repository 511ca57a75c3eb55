//! Sequence numbers and object keys.
//!
//! Every request on a session carries the next sequence number. The wire
//! field is a signed 64-bit integer, so a session whose counter passes
//! [`MAX_SEQUENCE`] is exhausted and must be replaced by a fresh connection
//! (the connection manager does that; this module only reports it).
//!
//! Object keys are `"{host}:{port}:{lexiKey}"` where `lexiKey` is a base-36
//! counter owned by the drive slot. The counter is rendered zero-padded to a
//! fixed width so byte order matches issuance order.

use crate::session::state::Drive;
use bytes::{Bytes, BytesMut};
use sha1::{Digest, Sha1};

/// Highest sequence number representable on the wire
pub const MAX_SEQUENCE: u64 = i64::MAX as u64;

/// Width of a rendered lexiKey; `u64::MAX` needs 13 base-36 digits
pub const KEY_DIGITS: usize = 13;

/// Number of leading key bytes perturbed by [`fragment_key`]
pub const FRAGMENT_PREFIX_LEN: usize = 8;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Per-session request counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequencer {
    next: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// The sequence number the next request will carry.
    pub fn current(&self) -> u64 {
        self.next
    }

    pub fn is_exhausted(&self) -> bool {
        self.next > MAX_SEQUENCE
    }

    /// Returns the current sequence and advances the counter, or `None`
    /// when the session has run out of sequence numbers.
    pub fn issue(&mut self) -> Option<u64> {
        if self.is_exhausted() {
            return None;
        }
        let sequence = self.next;
        self.next += 1;
        Some(sequence)
    }

    /// Overrides the counter. Values past [`MAX_SEQUENCE`] mark the session
    /// exhausted.
    pub fn set(&mut self, next: u64) {
        self.next = next;
    }
}

/// Base-36 key counter for one drive.
///
/// Lives in the drive slot rather than the session so that keys stay unique
/// when a session is replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyGenerator {
    counter: u64,
}

impl KeyGenerator {
    pub fn new(origin: u64) -> Self {
        Self { counter: origin }
    }

    /// The lexiKey the next PUT will use.
    pub fn lexi_key(&self) -> String {
        to_base36(self.counter)
    }

    /// Returns `"{host}:{port}:{lexiKey}"` and advances the counter.
    pub fn next_key(&mut self, drive: &Drive) -> Bytes {
        let key = format!("{}{}", drive.key_prefix(), self.lexi_key());
        self.counter = self.counter.wrapping_add(1);
        Bytes::from(key)
    }
}

/// Renders `n` in lowercase base 36, zero-padded to [`KEY_DIGITS`].
pub fn to_base36(mut n: u64) -> String {
    let mut digits = [b'0'; KEY_DIGITS];
    let mut pos = KEY_DIGITS;
    while n > 0 {
        pos -= 1;
        digits[pos] = BASE36_DIGITS[(n % 36) as usize];
        n /= 36;
    }
    digits.iter().map(|&b| b as char).collect()
}

/// Parses a base-36 lexiKey back into its counter value.
pub fn from_base36(s: &str) -> Option<u64> {
    u64::from_str_radix(s, 36).ok()
}

/// Derives the key of one erasure-coded fragment of an object.
///
/// The first [`FRAGMENT_PREFIX_LEN`] bytes of the object key are XORed with
/// the leading bytes of SHA-1 over the big-endian fragment index; the rest of
/// the key is kept as is. Applying it twice with the same index yields the
/// original key.
pub fn fragment_key(object_key: &[u8], fragment_index: u32) -> Bytes {
    let digest = Sha1::digest(fragment_index.to_be_bytes());
    let mut key = BytesMut::from(object_key);
    for (byte, mask) in key
        .iter_mut()
        .zip(digest.iter())
        .take(FRAGMENT_PREFIX_LEN)
    {
        *byte ^= mask;
    }
    key.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_increments_by_one() {
        let mut sequencer = Sequencer::new();
        let issued: Vec<u64> = (0..5).filter_map(|_| sequencer.issue()).collect();
        assert_eq!(issued, vec![0, 1, 2, 3, 4]);
        assert_eq!(sequencer.current(), 5);
    }

    #[test]
    fn test_sequence_exhaustion() {
        let mut sequencer = Sequencer::starting_at(MAX_SEQUENCE - 1);
        assert_eq!(sequencer.issue(), Some(MAX_SEQUENCE - 1));
        assert_eq!(sequencer.issue(), Some(MAX_SEQUENCE));
        assert!(sequencer.is_exhausted());
        assert_eq!(sequencer.issue(), None);
        assert_eq!(sequencer.issue(), None);
    }

    #[test]
    fn test_base36_rendering() {
        assert_eq!(to_base36(0), "0000000000000");
        assert_eq!(to_base36(35), "000000000000z");
        assert_eq!(to_base36(36), "0000000000010");
        assert_eq!(to_base36(u64::MAX), "3w5e11264sgsf");
        assert_eq!(from_base36(&to_base36(1_679_615)), Some(1_679_615));
    }

    #[test]
    fn test_keys_unique_and_ordered() {
        let drive = Drive::new("10.1.2.3", 8123);
        // Start just below a digit rollover to cover carry propagation.
        let mut keys = KeyGenerator::new(36 * 36 - 5);
        let generated: Vec<Bytes> = (0..500).map(|_| keys.next_key(&drive)).collect();

        for pair in generated.windows(2) {
            assert!(pair[0] < pair[1], "{:?} !< {:?}", pair[0], pair[1]);
        }
        assert!(generated[0].starts_with(b"10.1.2.3:8123:"));
    }

    #[test]
    fn test_lexi_key_advances_after_each_key() {
        let drive = Drive::new("h", 1);
        let mut keys = KeyGenerator::default();
        assert_eq!(keys.lexi_key(), "0000000000000");
        assert_eq!(&keys.next_key(&drive)[..], b"h:1:0000000000000");
        assert_eq!(keys.lexi_key(), "0000000000001");
    }

    #[test]
    fn test_fragment_key_only_touches_prefix() {
        let key = b"192.168.0.10:8123:00000000000ab";
        let fragment = fragment_key(key, 3);

        assert_eq!(fragment.len(), key.len());
        assert_eq!(&fragment[FRAGMENT_PREFIX_LEN..], &key[FRAGMENT_PREFIX_LEN..]);
        assert_ne!(&fragment[..FRAGMENT_PREFIX_LEN], &key[..FRAGMENT_PREFIX_LEN]);
    }

    #[test]
    fn test_fragment_keys_differ_per_index() {
        let key = b"drive:8123:0000000000001";
        let keys: Vec<Bytes> = (0..6).map(|i| fragment_key(key, i)).collect();
        for i in 0..keys.len() {
            for j in i + 1..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn test_fragment_key_is_an_involution() {
        let key = b"drive:8123:0000000000001";
        let once = fragment_key(key, 9);
        assert_eq!(&fragment_key(&once, 9)[..], &key[..]);
    }

    #[test]
    fn test_fragment_key_short_key() {
        let fragment = fragment_key(b"abc", 1);
        assert_eq!(fragment.len(), 3);
    }
}
