//! AES-256-GCM over the envelope `nonce (12) || ciphertext || tag (16)`.
//!
//! Nonces are drawn from the OS CSPRNG for every call; no associated data is
//! authenticated. Switching to counter nonces would change the format.

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use localcrypt_core::{EncryptionError, KeyMaterial};
use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// Size of the GCM nonce in bytes (96 bits).
pub const NONCE_LEN: usize = 12;
/// Size of the GCM authentication tag in bytes (128 bits).
pub const TAG_LEN: usize = 16;
/// Bytes an envelope adds on top of the plaintext.
pub const ENVELOPE_OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// Borrowed view of a well-formed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub nonce: &'a [u8],
    pub ciphertext: &'a [u8],
    pub tag: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Split `bytes` into its segments. Lengths are derived from the total size.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, EncryptionError> {
        if bytes.len() < ENVELOPE_OVERHEAD {
            return Err(EncryptionError::InvalidInput {
                reason: format!(
                    "encrypted data too short: {} bytes, need at least {ENVELOPE_OVERHEAD}",
                    bytes.len()
                ),
            });
        }
        let (nonce, rest) = bytes.split_at(NONCE_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);
        Ok(Self {
            nonce,
            ciphertext,
            tag,
        })
    }
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, EncryptionError> {
    let cipher = build_cipher(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| EncryptionError::CryptoOperation {
            reason: format!("nonce generation failed: {e}"),
        })?;

    let mut envelope = Vec::with_capacity(plaintext.len() + ENVELOPE_OVERHEAD);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(plaintext);

    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), &[], &mut envelope[NONCE_LEN..])
        .map_err(|e| EncryptionError::CryptoOperation {
            reason: format!("encrypt failed: {e}"),
        })?;
    envelope.extend_from_slice(&tag);
    Ok(envelope)
}

/// Verify and decrypt an envelope produced by [`encrypt`].
///
/// A tag mismatch yields [`EncryptionError::Integrity`]; the scratch buffer is
/// wiped and no plaintext escapes.
pub fn decrypt(envelope: &[u8], key: &KeyMaterial) -> Result<Vec<u8>, EncryptionError> {
    let parts = Envelope::parse(envelope)?;
    let cipher = build_cipher(key)?;

    let mut buffer = Zeroizing::new(parts.ciphertext.to_vec());
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(parts.nonce),
            &[],
            buffer.as_mut_slice(),
            Tag::from_slice(parts.tag),
        )
        .map_err(|_| EncryptionError::Integrity)?;

    Ok(std::mem::take(&mut *buffer))
}

fn build_cipher(key: &KeyMaterial) -> Result<Aes256Gcm, EncryptionError> {
    Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| EncryptionError::CryptoOperation {
        reason: format!("cipher init failed: {e}"),
    })
}
