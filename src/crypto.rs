use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use sha2::{Digest, Sha256};

use crate::error::Error;

/// GCM nonce, prepended to every encrypted blob.
pub const NONCE_LEN: usize = 12;

fn cipher_for(password: &str) -> Aes256Gcm {
    // AES-256 key is the SHA-256 of the repository password.
    let key = Sha256::digest(password.as_bytes());
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()))
}

/// Seal `plaintext` under the password-derived key. Output layout is a
/// random 12-byte nonce followed by ciphertext+tag.
pub fn encrypt(password: &str, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = cipher_for(password);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| Error::CipherAuth)?;
    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a blob produced by [`encrypt`]. Any authentication failure (bad
/// password, truncated or tampered data) maps to the fixed cipher-auth
/// error text.
pub fn decrypt(password: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.len() < NONCE_LEN {
        return Err(Error::CipherAuth);
    }
    let cipher = cipher_for(password);
    let nonce = Nonce::from_slice(&data[..NONCE_LEN]);
    cipher
        .decrypt(nonce, &data[NONCE_LEN..])
        .map_err(|_| Error::CipherAuth)
}
