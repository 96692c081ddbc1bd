use thiserror::Error;

use crate::store::KeyStoreError;

/// Failures surfaced by every encrypt/decrypt entry point.
///
/// Each operation either fully succeeds or reports exactly one of these.
/// Nothing is retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    /// Malformed envelope or invalid alias; rejected before any cipher call.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    /// The key store is unreachable, locked, denied or corrupted.
    #[error("key access failed for alias {alias}: {source}")]
    KeyAccess {
        alias: String,
        #[source]
        source: KeyStoreError,
    },
    /// The secure random source failed while creating a key.
    #[error("key generation failed: {reason}")]
    KeyGeneration { reason: String },
    /// Authentication tag verification failed (wrong key or tampered data).
    #[error("integrity check failed: ciphertext was not produced by this key or was modified")]
    Integrity,
    /// The AEAD primitive failed for a reason other than tag mismatch.
    #[error("crypto operation failed: {reason}")]
    CryptoOperation { reason: String },
}

/// Coarse category of an [`EncryptionError`], for hosts that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    KeyAccess,
    KeyGeneration,
    Integrity,
    CryptoOperation,
}

impl EncryptionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncryptionError::InvalidInput { .. } => ErrorKind::InvalidInput,
            EncryptionError::KeyAccess { .. } => ErrorKind::KeyAccess,
            EncryptionError::KeyGeneration { .. } => ErrorKind::KeyGeneration,
            EncryptionError::Integrity => ErrorKind::Integrity,
            EncryptionError::CryptoOperation { .. } => ErrorKind::CryptoOperation,
        }
    }

    pub fn key_access(alias: &str, source: KeyStoreError) -> Self {
        EncryptionError::KeyAccess {
            alias: alias.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = EncryptionError::key_access(
            "a",
            KeyStoreError::Unavailable {
                reason: "locked".into(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::KeyAccess);
        assert_eq!(EncryptionError::Integrity.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn key_access_message_names_alias_and_cause() {
        let err = EncryptionError::key_access(
            "alias1",
            KeyStoreError::Corrupted {
                alias: "alias1".into(),
                reason: "expected 32 bytes, got 4".into(),
            },
        );
        let message = err.to_string();
        assert!(message.contains("alias1"));
        assert!(message.contains("expected 32 bytes"));
    }
}
