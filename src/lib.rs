//! Composite key derivation for KDBX password databases.
//!
//! A master password, optionally combined with a key file, is turned into
//! the fixed-length key that decrypts the database. The [`service`] module
//! exposes an unlocked database to other local applications.

pub mod credentials;
pub mod crypto;
mod error;
pub mod keyfile;
pub mod service;
pub mod unlock;

pub use crate::credentials::Credentials;
pub use crate::crypto::{DerivedKey, KEY_LEN};
pub use crate::error::{AssociationError, CredentialError, RequestError, UnlockError};
pub use crate::keyfile::{KdbxKeyFile, KeyFileFormat, KeyFileLoader};
pub use crate::unlock::{DatabaseOpener, unlock};
