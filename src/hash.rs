//! Consistent rollout hashing.
//!
//! Maps an opaque caller identifier to a stable `u32` so percentage-based
//! rollout gives the same caller the same backend on every request. The hash
//! is the first four bytes of `SHA-256(caller_id)` read big-endian, which is
//! uniformly distributed over the 100 rollout buckets.

use sha2::{Digest, Sha256};

/// Computes the stable rollout hash for a caller identifier.
pub fn rollout_hash(caller_id: &str) -> u32 {
    let digest = Sha256::digest(caller_id.as_bytes());
    // Digest is always 32 bytes; take the first four big-endian.
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Whether a hash falls inside the rollout percentage.
pub fn in_rollout(hash: u32, rollout_percent: u8) -> bool {
    hash % 100 < u32::from(rollout_percent)
}
