use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use localcrypt_core::{EncryptionError, KeyAlias, KeyMaterial, KeyStore};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use tracing::{debug, instrument};

/// Get-or-create access to per-alias keys on top of a [`KeyStore`].
///
/// Creation for one alias is serialized by a per-alias lock, so concurrent
/// first users generate a single key. Lookups for existing keys take no lock.
/// Key bytes are never cached here; every call reads the store.
///
/// New keys are drawn from `R`, the OS generator unless one is supplied with
/// [`KeyManager::with_rng`].
pub struct KeyManager<S: KeyStore, R = OsRng> {
    store: S,
    rng: Mutex<R>,
    creation_locks: Mutex<HashMap<KeyAlias, Arc<Mutex<()>>>>,
}

impl<S: KeyStore> KeyManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_rng(store, OsRng)
    }
}

impl<S: KeyStore, R: RngCore + CryptoRng> KeyManager<S, R> {
    pub fn with_rng(store: S, rng: R) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
            creation_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the key for `alias`, generating and persisting it if absent.
    #[instrument(skip_all, fields(alias = %alias))]
    pub fn resolve_key(&self, alias: &KeyAlias) -> Result<KeyMaterial, EncryptionError> {
        if let Some(existing) = self.lookup(alias)? {
            return Ok(existing);
        }

        let lock = self.creation_lock(alias);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.create_once(alias)
        };
        self.release_creation_lock(alias, lock);
        result
    }

    /// Runs with the alias's creation lock held.
    fn create_once(&self, alias: &KeyAlias) -> Result<KeyMaterial, EncryptionError> {
        // another caller may have created it while we waited
        if let Some(existing) = self.lookup(alias)? {
            debug!("key created by concurrent caller");
            return Ok(existing);
        }

        let candidate = self.generate_key()?;
        let stored = self
            .store
            .create_if_absent(alias, candidate)
            .map_err(|e| EncryptionError::key_access(alias.as_str(), e))?;
        debug!("created new key");
        Ok(stored)
    }

    fn lookup(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, EncryptionError> {
        self.store
            .get(alias)
            .map_err(|e| EncryptionError::key_access(alias.as_str(), e))
    }

    fn generate_key(&self) -> Result<KeyMaterial, EncryptionError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        KeyMaterial::generate(|buf| rng.try_fill_bytes(buf)).map_err(|e| {
            EncryptionError::KeyGeneration {
                reason: e.to_string(),
            }
        })
    }

    fn creation_lock(&self, alias: &KeyAlias) -> Arc<Mutex<()>> {
        // the map only holds unit mutexes, so a poisoned guard has nothing to repair
        let mut locks = self
            .creation_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(alias.clone()).or_default())
    }

    /// Drop the alias's lock from the map once no other caller holds it.
    fn release_creation_lock(&self, alias: &KeyAlias, lock: Arc<Mutex<()>>) {
        let mut locks = self
            .creation_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // clones are only taken under the map lock: the map plus `lock` means no waiters
        if Arc::strong_count(&lock) == 2 {
            locks.remove(alias);
        }
    }

    #[cfg(test)]
    fn pending_creation_locks(&self) -> usize {
        self.creation_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
