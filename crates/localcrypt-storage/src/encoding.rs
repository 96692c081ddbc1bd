use base64::{engine::general_purpose, Engine as _};
use localcrypt_core::{KeyMaterial, KEY_LEN};
use thiserror::Error;
use zeroize::Zeroizing;

/// Reasons a stored secret cannot be turned back into key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("base64 decode failed: {0}")]
    Base64(String),
    #[error("expected {KEY_LEN} bytes, got {0}")]
    Length(usize),
}

pub(crate) fn encode_key(material: &KeyMaterial) -> Zeroizing<String> {
    Zeroizing::new(general_purpose::STANDARD.encode(material.as_bytes()))
}

pub(crate) fn decode_key(secret: &str) -> Result<KeyMaterial, DecodeError> {
    let bytes = Zeroizing::new(
        general_purpose::STANDARD
            .decode(secret.trim())
            .map_err(|e| DecodeError::Base64(e.to_string()))?,
    );
    KeyMaterial::from_slice(&bytes).ok_or(DecodeError::Length(bytes.len()))
}
