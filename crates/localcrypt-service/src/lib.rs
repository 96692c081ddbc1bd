//! Alias-scoped AES-256-GCM encryption with lazily created, store-held keys.
//!
//! [`LocalEncryption`] is the entry point. It resolves the key for an alias
//! through [`KeyManager`] (creating it exactly once on first use) and runs the
//! [`cipher`] over the fixed `nonce || ciphertext || tag` envelope.

pub mod cipher;
pub mod key_manager;
pub mod service;

#[cfg(test)]
mod test_support;

pub use key_manager::KeyManager;
pub use service::LocalEncryption;
