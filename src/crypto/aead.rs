//! XChaCha20-Poly1305 with random 24-byte nonces.

use anyhow::{Result, anyhow, bail};
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use zeroize::Zeroizing;

use super::{AEAD_KEY_LEN, AEAD_NONCE_LEN};

/// Encrypts `plaintext` under a fresh random nonce, returned alongside.
pub fn encrypt(
    key: &[u8; AEAD_KEY_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; AEAD_NONCE_LEN])> {
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    getrandom::fill(&mut nonce).map_err(|_| anyhow!("OS random generator unavailable"))?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| anyhow!("encryption failed"))?;

    Ok((ciphertext, nonce))
}

/// Fails if the nonce length is wrong or authentication fails.
pub fn decrypt(
    key: &[u8; AEAD_KEY_LEN],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != AEAD_NONCE_LEN {
        bail!("invalid nonce length");
    }
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));

    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| anyhow!("invalid key or corrupted data"))?;
    Ok(Zeroizing::new(plaintext))
}
