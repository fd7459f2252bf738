use std::fmt;

/// Failure to turn user secrets into a derived key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    KeyFileUnreadable,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::KeyFileUnreadable => write!(f, "could not read key file"),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Failure of the unlock workflow.
///
/// A key file that cannot be read is reported separately from a key the
/// database rejected, which is how a wrong password surfaces.
#[derive(Debug)]
pub enum UnlockError {
    KeyFileUnreadable,
    Rejected(anyhow::Error),
}

impl fmt::Display for UnlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlockError::KeyFileUnreadable => write!(f, "could not read key file"),
            UnlockError::Rejected(e) => {
                write!(f, "invalid credentials or corrupted database: {e}")
            }
        }
    }
}

impl std::error::Error for UnlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UnlockError::KeyFileUnreadable => None,
            UnlockError::Rejected(e) => Some(e.as_ref()),
        }
    }
}

impl From<CredentialError> for UnlockError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::KeyFileUnreadable => UnlockError::KeyFileUnreadable,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AssociationError {
    AlreadyExists(String),
    Full(usize),
}

impl fmt::Display for AssociationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssociationError::AlreadyExists(id) => write!(f, "association '{id}' already exists"),
            AssociationError::Full(max) => write!(f, "association limit of {max} reached"),
        }
    }
}

impl std::error::Error for AssociationError {}

/// Reasons a service request is refused before it reaches the database.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestError {
    Malformed(String),
    UnsupportedRequestType(String),
    MissingField(&'static str),
    InvalidKey,
    NotAssociated,
    AssociationDenied,
    TooManyAssociations,
    VerificationFailed,
    EncryptionFailed,
    DecryptionFailed,
    RandomUnavailable,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Malformed(e) => write!(f, "malformed request: {e}"),
            RequestError::UnsupportedRequestType(t) => {
                write!(f, "unsupported request type '{t}'")
            }
            RequestError::MissingField(name) => write!(f, "missing field '{name}'"),
            RequestError::InvalidKey => write!(f, "association key must be 32 base64 bytes"),
            RequestError::NotAssociated => write!(f, "client is not associated"),
            RequestError::AssociationDenied => write!(f, "association was not approved"),
            RequestError::TooManyAssociations => write!(f, "too many associated clients"),
            RequestError::VerificationFailed => write!(f, "request verification failed"),
            RequestError::EncryptionFailed => write!(f, "failed to encrypt entry"),
            RequestError::DecryptionFailed => write!(f, "failed to decrypt entry"),
            RequestError::RandomUnavailable => write!(f, "OS random generator unavailable"),
        }
    }
}

impl std::error::Error for RequestError {}
