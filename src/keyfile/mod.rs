//! Key-file loading.
//!
//! A key file is any byte source. The loader turns it into raw key material
//! or reports that none could be obtained.

use std::io::Read;

use zeroize::Zeroizing;

use crate::crypto::{DIGEST_LEN, digest::digest};

pub mod xml;

/// Length of a raw binary key file.
pub const BINARY_KEY_LEN: usize = 32;
/// Length of a key file holding the key as hex text.
pub const HEX_KEY_LEN: usize = 2 * BINARY_KEY_LEN;

/// Produces key material from a key-file byte source.
///
/// `None` is the single failure signal; every cause (I/O error, malformed
/// content, empty source) is reported the same way.
pub trait KeyFileLoader {
    fn load(&self, source: &mut dyn Read) -> Option<Zeroizing<Vec<u8>>>;
}

/// How a key file's content is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFileFormat {
    /// XML document with a `<KeyFile>` root.
    Xml,
    /// Exactly 32 raw bytes.
    Binary,
    /// Exactly 64 hex characters.
    Hex,
    /// Anything else; the key is the digest of the whole content.
    Hashed,
}

impl KeyFileFormat {
    pub fn detect(data: &[u8]) -> Self {
        if xml::is_key_file(data) {
            KeyFileFormat::Xml
        } else if data.len() == BINARY_KEY_LEN {
            KeyFileFormat::Binary
        } else if data.len() == HEX_KEY_LEN && data.iter().all(u8::is_ascii_hexdigit) {
            KeyFileFormat::Hex
        } else {
            KeyFileFormat::Hashed
        }
    }
}

/// The standard KDBX key-file loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct KdbxKeyFile;

impl KdbxKeyFile {
    /// Extracts key material from the complete content of a key file.
    pub fn parse(data: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        if data.is_empty() {
            tracing::debug!("key file is empty");
            return None;
        }

        let format = KeyFileFormat::detect(data);
        tracing::debug!(?format, len = data.len(), "key file format detected");

        match format {
            KeyFileFormat::Xml => xml::parse(data),
            KeyFileFormat::Binary => Some(Zeroizing::new(data.to_vec())),
            KeyFileFormat::Hex => hex::decode(data).ok().map(Zeroizing::new),
            KeyFileFormat::Hashed => {
                let hashed: Zeroizing<[u8; DIGEST_LEN]> = Zeroizing::new(digest(data));
                Some(Zeroizing::new(hashed.to_vec()))
            }
        }
    }
}

impl KeyFileLoader for KdbxKeyFile {
    fn load(&self, source: &mut dyn Read) -> Option<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        if let Err(e) = source.read_to_end(&mut data) {
            tracing::warn!(error = %e, "failed to read key file");
            return None;
        }
        Self::parse(&data)
    }
}
