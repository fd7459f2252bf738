//! Cryptographic primitives for composite key derivation.
//!
//! Provides the fixed digest algorithm, the derived key type, the
//! password / key-file derivation functions and the AEAD used by the
//! credential service.

pub mod aead;
pub mod digest;
pub mod kdf;
pub mod key;

pub use digest::{KeyDigest, new_digest};
pub use kdf::{derive_composite_key, derive_password_key};
pub use key::DerivedKey;

/// Output length of the key digest (32 bytes / 256 bits).
pub const DIGEST_LEN: usize = 32;
/// Length of the derived key. Always equal to [`DIGEST_LEN`].
pub const KEY_LEN: usize = DIGEST_LEN;
/// Length of an AEAD key (32 bytes for XChaCha20-Poly1305).
pub const AEAD_KEY_LEN: usize = 32;
/// Length of an AEAD nonce (24 bytes for XChaCha20-Poly1305).
pub const AEAD_NONCE_LEN: usize = 24;
