use std::{path::PathBuf, sync::Arc};

use color_eyre::{eyre::eyre, Result};
use dirs::data_dir;
use localcrypt_core::KeyStore;
use localcrypt_service::LocalEncryption;
use localcrypt_storage::{file_store::FileKeyStore, keyring_store::KeyringKeyStore};
use tracing::debug;

use crate::config::{Backend, Config};

pub type SharedKeyStore = Arc<dyn KeyStore>;

fn default_data_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| eyre!("no data dir available"))?;
    Ok(base.join("localcrypt"))
}

/// Resolve the default key directory for the file backend.
pub fn default_key_dir() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("keys"))
}

/// Lock file every localcrypt process takes before creating a keyring entry.
pub fn default_keyring_lock() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("keyring.lock"))
}

/// Build the key store selected by config (or `LOCALCRYPT_BACKEND`).
///
/// Each command runs in a fresh process, so a store that does not answer is
/// an error: keys put anywhere else would be gone before the next command.
pub fn store_from_config(config: &Config) -> Result<SharedKeyStore> {
    match config.backend()? {
        Backend::Keyring => {
            debug!(service = config.keyring_service(), "initializing keyring store");
            require_available(
                KeyringKeyStore::new(config.keyring_service(), default_keyring_lock()?),
                "keyring",
            )
        }
        Backend::File => {
            let root = match &config.key_dir {
                Some(root) => root.clone(),
                None => default_key_dir()?,
            };
            debug!(?root, "initializing file key store");
            require_available(FileKeyStore::new(root), "file")
        }
    }
}

/// Build the service over the configured store.
pub fn service_from_config(config: &Config) -> Result<LocalEncryption<SharedKeyStore>> {
    Ok(LocalEncryption::new(store_from_config(config)?))
}

fn require_available<S: KeyStore + 'static>(store: S, backend: &str) -> Result<SharedKeyStore> {
    if !store.is_available() {
        return Err(eyre!(
            "{backend} key store is unavailable; fix it or select another backend with `backend` in the config or {}",
            crate::config::BACKEND_ENV
        ));
    }
    Ok(Arc::new(store))
}

/// Helper for tests to construct a service over a key directory in a temp dir.
#[cfg(test)]
pub fn test_service(root: impl Into<PathBuf>) -> LocalEncryption<SharedKeyStore> {
    LocalEncryption::new(Arc::new(FileKeyStore::new(root)) as SharedKeyStore)
}
