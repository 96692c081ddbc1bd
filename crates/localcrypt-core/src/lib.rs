//! Core abstractions for localcrypt: key aliases and material, the secure key
//! store contract, the error taxonomy and the encryptor interface.
//! This crate is intentionally small to keep dependency surface minimal.

pub mod encryptor;
pub mod error;
pub mod keys;
pub mod store;

pub use encryptor::Encryptor;
pub use error::{EncryptionError, ErrorKind};
pub use keys::{KeyAlias, KeyMaterial, KEY_LEN};
pub use store::{InMemoryKeyStore, KeyStore, KeyStoreError};
