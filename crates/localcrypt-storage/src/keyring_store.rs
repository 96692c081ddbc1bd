use std::path::{Path, PathBuf};

use localcrypt_core::{KeyAlias, KeyMaterial, KeyStore, KeyStoreError};
use tracing::{debug, instrument};

use crate::{
    encoding::{decode_key, encode_key},
    lock_file::LockFile,
};

/// Account used to probe whether the platform keyring answers at all.
const PROBE_ACCOUNT: &str = "__localcrypt_probe__";

/// OS keyring-backed store. Each alias is one entry under `service`, with the
/// alias as the account name and the key as a base64 secret.
///
/// The keyring can only overwrite, so creation holds an exclusive lock on
/// `lock_path` from the absence check until the read-back. Every process
/// using the same service must use the same lock path.
pub struct KeyringKeyStore {
    service: String,
    lock_path: PathBuf,
}

impl KeyringKeyStore {
    pub fn new(service: impl Into<String>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            service: service.into(),
            lock_path: lock_path.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn entry(&self, account: &str) -> Result<keyring::Entry, KeyStoreError> {
        keyring::Entry::new(&self.service, account).map_err(unavailable)
    }

    fn read(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError> {
        let entry = self.entry(alias.as_str())?;
        match entry.get_password() {
            Ok(secret) => decode_key(&secret)
                .map(Some)
                .map_err(|e| KeyStoreError::Corrupted {
                    alias: alias.to_string(),
                    reason: e.to_string(),
                }),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::BadEncoding(_)) => Err(KeyStoreError::Corrupted {
                alias: alias.to_string(),
                reason: "secret is not valid UTF-8".to_string(),
            }),
            Err(err) => Err(unavailable(err)),
        }
    }
}

impl KeyStore for KeyringKeyStore {
    #[instrument(skip_all, fields(alias = %alias))]
    fn get(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError> {
        self.read(alias)
    }

    /// An existing entry is returned untouched. Otherwise the key is written
    /// and read back while the lock file is held, so a creator in another
    /// process either sees this key or writes nothing.
    #[instrument(skip_all, fields(alias = %alias))]
    fn create_if_absent(
        &self,
        alias: &KeyAlias,
        material: KeyMaterial,
    ) -> Result<KeyMaterial, KeyStoreError> {
        if let Some(existing) = self.read(alias)? {
            debug!("keyring entry already present");
            return Ok(existing);
        }

        let _lock = LockFile::acquire(&self.lock_path).map_err(|e| KeyStoreError::Unavailable {
            reason: format!("keyring lock {}: {e}", self.lock_path.display()),
        })?;
        if let Some(existing) = self.read(alias)? {
            debug!("keyring entry created by another process");
            return Ok(existing);
        }

        self.entry(alias.as_str())?
            .set_password(&encode_key(&material))
            .map_err(unavailable)?;

        self.read(alias)?.ok_or_else(|| KeyStoreError::Unavailable {
            reason: "key was written but could not be read back".to_string(),
        })
    }

    #[instrument(skip_all, fields(alias = %alias))]
    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError> {
        match self.entry(alias.as_str())?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(unavailable(err)),
        }
    }

    fn is_available(&self) -> bool {
        let Ok(entry) = keyring::Entry::new(&self.service, PROBE_ACCOUNT) else {
            return false;
        };
        matches!(entry.get_password(), Ok(_) | Err(keyring::Error::NoEntry))
    }
}

fn unavailable(err: keyring::Error) -> KeyStoreError {
    KeyStoreError::Unavailable {
        reason: format!("keyring error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_service_name_and_lock_path() {
        let store = KeyringKeyStore::new("localcrypt-test", "/tmp/localcrypt/keyring.lock");
        assert_eq!(store.service(), "localcrypt-test");
        assert_eq!(store.lock_path(), Path::new("/tmp/localcrypt/keyring.lock"));
    }

    #[test]
    fn platform_errors_map_to_unavailable() {
        let err = unavailable(keyring::Error::NoStorageAccess("locked".into()));
        assert!(matches!(err, KeyStoreError::Unavailable { reason } if reason.contains("keyring")));
    }
}
