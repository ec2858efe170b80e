//! xxHash-based fingerprints for compiled statements.
//!
//! Fingerprints are deterministic 64-bit hashes of rendered SQL, used by
//! callers that cache or diff compiled output.

use xxhash_rust::xxh64;

/// Fixed seed so fingerprints are stable across processes and releases.
const SEED: u64 = 0x517cc1b727220a95;

/// Compute a 64-bit xxHash fingerprint of a text representation.
pub fn fingerprint(input: &str) -> u64 {
    xxh64::xxh64(input.as_bytes(), SEED)
}
