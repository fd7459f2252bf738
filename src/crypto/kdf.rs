use sha2::Digest;
use zeroize::Zeroizing;

use super::{DerivedKey, digest::digest, new_digest};

/// Derives the key for a password-only database.
///
/// `key = H(H(password))`. Any byte sequence is accepted, including an empty one.
pub fn derive_password_key(password: &[u8]) -> DerivedKey {
    let first = Zeroizing::new(digest(password));
    DerivedKey::new(digest(&first[..]))
}

/// Derives the key for a database protected by a password and a key file.
///
/// `key = H(H(password) || key_file_data)`. The password is hashed a single
/// round here; the two inputs are streamed into one digest context.
pub fn derive_composite_key(password: &[u8], key_file_data: &[u8]) -> DerivedKey {
    let pw_key = Zeroizing::new(digest(password));

    let mut md = new_digest();
    md.update(&pw_key[..]);
    md.update(key_file_data);
    DerivedKey::new(md.finalize().into())
}
