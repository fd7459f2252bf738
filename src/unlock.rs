//! Unlock workflow: secrets in, opened database out.

use crate::credentials::Credentials;
use crate::crypto::DerivedKey;
use crate::error::UnlockError;
use crate::keyfile::KeyFileLoader;

/// The decryption routine that consumes a derived key.
///
/// An `Err` means the key was rejected, which is how a wrong password or a
/// wrong key file shows up.
pub trait DatabaseOpener {
    type Database;

    fn open(&self, key: &DerivedKey) -> anyhow::Result<Self::Database>;
}

/// Derives the key for `credentials` and opens the database with it.
///
/// The key is dropped, and scrubbed, before this returns. A key file that
/// yields no material aborts before `opener` is consulted.
pub fn unlock<O, L>(
    credentials: Credentials,
    loader: &L,
    opener: &O,
) -> Result<O::Database, UnlockError>
where
    O: DatabaseOpener + ?Sized,
    L: KeyFileLoader + ?Sized,
{
    let with_key_file = credentials.has_key_file();
    let key = credentials.derive_key(loader)?;

    let database = opener.open(&key).map_err(|e| {
        tracing::warn!(with_key_file, "database rejected derived key");
        UnlockError::Rejected(e)
    })?;
    drop(key);

    tracing::info!(with_key_file, "database unlocked");
    Ok(database)
}
