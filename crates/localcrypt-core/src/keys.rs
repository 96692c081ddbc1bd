use std::fmt;

use zeroize::Zeroizing;

use crate::error::EncryptionError;

/// Size of a symmetric key in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Identifier scoping exactly one symmetric key.
///
/// Only non-emptiness is checked; uniqueness and meaning are up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyAlias(String);

impl KeyAlias {
    pub fn new(alias: impl Into<String>) -> Result<Self, EncryptionError> {
        let alias = alias.into();
        if alias.is_empty() {
            return Err(EncryptionError::InvalidInput {
                reason: "key alias must not be empty".to_string(),
            });
        }
        Ok(Self(alias))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyAlias {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for KeyAlias {
    type Error = EncryptionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 256-bit symmetric key.
///
/// The bytes are wiped when the value is dropped and never appear in `Debug`
/// output. Copies handed out by a store live for one operation only.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl KeyMaterial {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Build from a slice, returning `None` unless it is exactly [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LEN {
            return None;
        }
        Self::generate(|buf| {
            buf.copy_from_slice(bytes);
            Ok::<_, std::convert::Infallible>(())
        })
        .ok()
    }

    /// Let `fill` write the key straight into its wiped-on-drop buffer, so no
    /// unmanaged copy of the bytes is left behind.
    pub fn generate<E>(fill: impl FnOnce(&mut [u8]) -> Result<(), E>) -> Result<Self, E> {
        let mut key = Self {
            bytes: Zeroizing::new([0u8; KEY_LEN]),
        };
        fill(&mut key.bytes[..])?;
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("bytes", &"<redacted>")
            .finish()
    }
}
