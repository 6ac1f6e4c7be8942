//! SHA-512 digest wrapper. Thin by design: every other module treats
//! [`crate::Hash`] as an opaque 64-byte value and never reaches for `sha2`
//! directly (spec.md §6 fixes SHA-512 as the protocol hash algorithm).

use sha2::{Digest, Sha512};

use crate::Hash;

/// Hashes `msg` with SHA-512.
pub fn hash(msg: &[u8]) -> Hash {
    let digest = Sha512::digest(msg);
    let mut out: Hash = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}
