//! Concrete secure key stores for localcrypt.
//! Keys live in the OS keyring in production, or in a private key directory
//! when no keyring is available.

pub mod encoding;
pub mod file_store;
pub mod keyring_store;
mod lock_file;
