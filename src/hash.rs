//! Keyed hash service backing cell checksums and index selection.
//!
//! SipHash-2-4 with fixed keys, so that two tables built independently on
//! different machines agree on every digest and every cell index. The keys
//! are part of the wire contract: tables built with different keys cannot
//! be meaningfully subtracted.

use siphasher::sip::SipHasher24;
use std::hash::Hasher;

/// First half of the fixed SipHash key.
pub const KEY0: u64 = 465;
/// Second half of the fixed SipHash key. Index selection folds the salt
/// into this half.
pub const KEY1: u64 = 629;

/// Width of the full digest in bytes. Cell checksums use a prefix of it,
/// so a table's hash width can be at most this.
pub const DIGEST_LEN: usize = 8;

fn sip24(key0: u64, key1: u64, data: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_keys(key0, key1);
    hasher.write(data);
    hasher.finish()
}

/// Checksum digest of an element, serialized big-endian. The first
/// `hash_len` bytes feed a cell's hash sum.
pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    sip24(KEY0, KEY1, data).to_be_bytes()
}

/// Salted variant used to pick cell indices. The salt starts at 1 and
/// increments on every draw, including draws rejected as duplicates, so
/// the exact sequence is part of cross-table compatibility.
pub fn index_seed(data: &[u8], salt: u64) -> u64 {
    sip24(KEY0, KEY1.wrapping_add(salt), data)
}
