use sha2::{Digest, Sha256};

use super::DIGEST_LEN;

/// Digest algorithm used for every key derivation.
///
/// Changing this breaks every database created with the previous algorithm.
pub type KeyDigest = Sha256;

/// Returns a fresh, zero-state digest context.
///
/// Each derivation step asks for its own context; nothing is shared between calls.
pub fn new_digest() -> KeyDigest {
    KeyDigest::new()
}

/// One-shot digest over `data`.
pub(crate) fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut md = new_digest();
    md.update(data);
    md.finalize().into()
}
