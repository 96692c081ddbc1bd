use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use localcrypt_core::{KeyAlias, KeyMaterial, KeyStore, KeyStoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::encoding::{decode_key, encode_key};

const FORMAT_VERSION: u8 = 1;
const KEY_EXTENSION: &str = "key";

/// Directory-backed key store: one file per alias, named by the SHA-256 of
/// the alias so any alias length maps to a fixed-size file name.
///
/// New keys are written to a temp file in the same directory and moved into
/// place without clobbering, so creation is atomic even across processes.
/// Temp files are created owner-read/write only.
pub struct FileKeyStore {
    root: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct StoredKey {
    version: u8,
    alias: String,
    key: String,
}

impl Drop for StoredKey {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(&mut self.key);
    }
}

impl FileKeyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, alias: &KeyAlias) -> PathBuf {
        let digest = Sha256::digest(alias.as_str().as_bytes());
        self.root
            .join(format!("{}.{KEY_EXTENSION}", hex::encode(digest)))
    }

    fn read(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError> {
        let path = self.path_for(alias);
        let contents = match fs::read(&path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(storage_err(err)),
        };

        let stored: StoredKey =
            serde_json::from_slice(&contents).map_err(|e| corrupted(alias, e))?;
        if stored.version != FORMAT_VERSION {
            return Err(corrupted(
                alias,
                format!("unsupported key file version {}", stored.version),
            ));
        }
        if stored.alias != alias.as_str() {
            return Err(corrupted(alias, "key file belongs to a different alias"));
        }
        decode_key(&stored.key)
            .map(Some)
            .map_err(|e| corrupted(alias, e))
    }
}

impl KeyStore for FileKeyStore {
    #[instrument(skip_all, fields(alias = %alias))]
    fn get(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError> {
        self.read(alias)
    }

    #[instrument(skip_all, fields(alias = %alias))]
    fn create_if_absent(
        &self,
        alias: &KeyAlias,
        material: KeyMaterial,
    ) -> Result<KeyMaterial, KeyStoreError> {
        fs::create_dir_all(&self.root).map_err(storage_err)?;

        let stored = StoredKey {
            version: FORMAT_VERSION,
            alias: alias.to_string(),
            key: encode_key(&material).to_string(),
        };
        let json = Zeroizing::new(serde_json::to_vec(&stored).map_err(storage_err)?);

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(storage_err)?;
        tmp.write_all(&json).map_err(storage_err)?;
        tmp.as_file().sync_all().map_err(storage_err)?;

        let path = self.path_for(alias);
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(material),
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                debug!("key file created concurrently; using existing key");
                self.read(alias)?.ok_or_else(|| KeyStoreError::Unavailable {
                    reason: format!("key file {} vanished during create", path.display()),
                })
            }
            Err(err) => Err(storage_err(err.error)),
        }
    }

    #[instrument(skip_all, fields(alias = %alias))]
    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError> {
        match fs::remove_file(self.path_for(alias)) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }

    fn is_available(&self) -> bool {
        fs::create_dir_all(&self.root).is_ok()
    }
}

fn storage_err<E: ToString>(err: E) -> KeyStoreError {
    KeyStoreError::Unavailable {
        reason: err.to_string(),
    }
}

fn corrupted<E: ToString>(alias: &KeyAlias, err: E) -> KeyStoreError {
    KeyStoreError::Corrupted {
        alias: alias.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;

    fn alias(name: &str) -> KeyAlias {
        KeyAlias::new(name).expect("valid alias")
    }

    #[test]
    fn create_then_get_returns_same_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path().join("keys"));
        let key = KeyMaterial::from_bytes([3; 32]);

        let stored = store
            .create_if_absent(&alias("wallet/seed"), key.clone())
            .expect("create");
        assert_eq!(stored, key);
        assert_eq!(store.get(&alias("wallet/seed")).expect("get"), Some(key));

        // alias is hashed, so path separators never escape the key directory
        let entries: Vec<_> = fs::read_dir(store.root())
            .expect("read dir")
            .collect::<Result<_, _>>()
            .expect("entries");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn missing_key_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path());
        assert_eq!(store.get(&alias("nothing")).expect("get"), None);
    }

    #[test]
    fn existing_key_is_not_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path());
        let first = KeyMaterial::from_bytes([1; 32]);

        store
            .create_if_absent(&alias("a"), first.clone())
            .expect("first create");
        let winner = store
            .create_if_absent(&alias("a"), KeyMaterial::from_bytes([2; 32]))
            .expect("second create");
        assert_eq!(winner, first);
    }

    #[test]
    fn concurrent_creators_agree_on_one_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let root = root.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    // separate instances, as separate processes would have
                    let store = FileKeyStore::new(root);
                    barrier.wait();
                    store
                        .create_if_absent(&alias("race"), KeyMaterial::from_bytes([i; 32]))
                        .expect("create")
                })
            })
            .collect();

        let keys: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
        let on_disk = FileKeyStore::new(root)
            .get(&alias("race"))
            .expect("get")
            .expect("present");
        assert_eq!(on_disk, keys[0]);
    }

    #[test]
    fn malformed_file_is_corrupted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path());
        fs::write(store.path_for(&alias("bad")), b"{not json").expect("write");

        let err = store.get(&alias("bad")).expect_err("should be corrupted");
        assert!(matches!(err, KeyStoreError::Corrupted { .. }));
    }

    #[test]
    fn wrong_length_key_is_corrupted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path());
        fs::write(
            store.path_for(&alias("short")),
            br#"{"version":1,"alias":"short","key":"abcd"}"#,
        )
        .expect("write");

        let err = store.get(&alias("short")).expect_err("should be corrupted");
        assert!(matches!(err, KeyStoreError::Corrupted { reason, .. } if reason.contains("32")));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path());
        store
            .create_if_absent(&alias("k"), KeyMaterial::from_bytes([8; 32]))
            .expect("create");
        store.delete(&alias("k")).expect("delete");
        store.delete(&alias("k")).expect("delete again");
        assert_eq!(store.get(&alias("k")).expect("get"), None);
    }

    #[test]
    fn key_file_is_versioned_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path());
        store
            .create_if_absent(&alias("fmt"), KeyMaterial::from_bytes([0; 32]))
            .expect("create");
        let raw = fs::read_to_string(store.path_for(&alias("fmt"))).expect("read");
        assert!(raw.contains("\"version\":1"));
        assert!(raw.contains("\"alias\":\"fmt\""));
        assert!(raw.contains("\"key\":"));
    }

    #[test]
    fn long_alias_gets_fixed_length_file_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path());
        let long = alias(&"a".repeat(300));
        let key = KeyMaterial::from_bytes([6; 32]);

        store
            .create_if_absent(&long, key.clone())
            .expect("create with long alias");
        assert_eq!(store.get(&long).expect("get"), Some(key));

        let name = store.path_for(&long);
        let name = name.file_name().expect("file name").to_string_lossy();
        assert_eq!(name.len(), 64 + 1 + KEY_EXTENSION.len());
    }

    #[test]
    fn key_file_under_another_alias_is_corrupted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileKeyStore::new(dir.path());
        store
            .create_if_absent(&alias("mine"), KeyMaterial::from_bytes([4; 32]))
            .expect("create");
        fs::copy(store.path_for(&alias("mine")), store.path_for(&alias("theirs")))
            .expect("copy");

        let err = store.get(&alias("theirs")).expect_err("alias mismatch");
        assert!(matches!(err, KeyStoreError::Corrupted { reason, .. } if reason.contains("different alias")));
    }
}
