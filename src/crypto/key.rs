use std::fmt;

use zeroize::Zeroizing;

use super::KEY_LEN;

/// Fixed-length key handed to the database decryption routine.
///
/// The bytes are scrubbed when the key is dropped. They can only be read
/// through [`DerivedKey::as_bytes`].
pub struct DerivedKey(Zeroizing<[u8; KEY_LEN]>);

impl DerivedKey {
    pub(crate) fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(..)")
    }
}
