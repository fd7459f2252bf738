//! User secrets that unlock a database.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use zeroize::Zeroizing;

use crate::crypto::{self, DerivedKey};
use crate::error::CredentialError;
use crate::keyfile::KeyFileLoader;

/// The supported ways of producing an unlock key.
///
/// The set is fixed by the database format.
pub enum Credentials {
    /// Master password only. An empty password means "no password".
    Password(Zeroizing<Vec<u8>>),
    /// Master password combined with key-file material.
    PasswordAndKeyFile {
        password: Zeroizing<Vec<u8>>,
        key_file: Box<dyn Read + Send>,
    },
}

impl Credentials {
    pub fn password(password: impl Into<Vec<u8>>) -> Self {
        Credentials::Password(Zeroizing::new(password.into()))
    }

    pub fn with_key_file(
        password: impl Into<Vec<u8>>,
        key_file: impl Read + Send + 'static,
    ) -> Self {
        Credentials::PasswordAndKeyFile {
            password: Zeroizing::new(password.into()),
            key_file: Box::new(key_file),
        }
    }

    /// Password plus a key file on disk.
    ///
    /// A key file that cannot be opened is reported the same way as one that
    /// cannot be parsed.
    pub fn with_key_file_path(
        password: impl Into<Vec<u8>>,
        path: impl AsRef<Path>,
    ) -> Result<Self, CredentialError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            let path = path.as_ref().display();
            tracing::warn!(%path, error = %e, "key file cannot be opened");
            CredentialError::KeyFileUnreadable
        })?;
        Ok(Self::with_key_file(password, file))
    }

    pub fn has_key_file(&self) -> bool {
        matches!(self, Credentials::PasswordAndKeyFile { .. })
    }

    /// Derives the database key, consuming the credentials.
    ///
    /// The key-file source is handed to `loader` exactly once. If the loader
    /// yields nothing, derivation fails; there is no fallback to the
    /// password-only key.
    pub fn derive_key<L>(self, loader: &L) -> Result<DerivedKey, CredentialError>
    where
        L: KeyFileLoader + ?Sized,
    {
        match self {
            Credentials::Password(password) => Ok(crypto::derive_password_key(&password)),
            Credentials::PasswordAndKeyFile {
                password,
                mut key_file,
            } => {
                let Some(material) = loader.load(&mut *key_file) else {
                    tracing::warn!("key file did not yield key material");
                    return Err(CredentialError::KeyFileUnreadable);
                };
                tracing::debug!(len = material.len(), "key file loaded");
                Ok(crypto::derive_composite_key(&password, &material))
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password(_) => f.write_str("Credentials::Password(..)"),
            Credentials::PasswordAndKeyFile { .. } => {
                f.write_str("Credentials::PasswordAndKeyFile(..)")
            }
        }
    }
}
