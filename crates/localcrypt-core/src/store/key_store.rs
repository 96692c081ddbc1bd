use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use thiserror::Error;

use crate::keys::{KeyAlias, KeyMaterial};

/// Errors produced by secure key store implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// Store is locked, unreachable or denied by platform policy.
    #[error("key store unavailable: {reason}")]
    Unavailable { reason: String },
    /// An entry exists but cannot be decoded into key material.
    #[error("stored key for {alias} is corrupted: {reason}")]
    Corrupted { alias: String, reason: String },
}

/// Persistence for per-alias key material (OS keychain, key files, memory).
///
/// Implementations must make `create_if_absent` atomic with respect to other
/// creators of the same alias: whoever loses the race gets the winner's key back.
pub trait KeyStore: Send + Sync {
    /// Fetch the key stored under `alias`, if any.
    fn get(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError>;

    /// Persist `material` under `alias` unless a key already exists.
    /// Returns the key that is stored once the call completes.
    fn create_if_absent(
        &self,
        alias: &KeyAlias,
        material: KeyMaterial,
    ) -> Result<KeyMaterial, KeyStoreError>;

    /// Remove the key for `alias` (idempotent).
    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError>;

    /// Cheap probe used at start-up to decide whether the backend is usable.
    fn is_available(&self) -> bool {
        true
    }
}

impl<S: KeyStore + ?Sized> KeyStore for Arc<S> {
    fn get(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError> {
        (**self).get(alias)
    }

    fn create_if_absent(
        &self,
        alias: &KeyAlias,
        material: KeyMaterial,
    ) -> Result<KeyMaterial, KeyStoreError> {
        (**self).create_if_absent(alias, material)
    }

    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError> {
        (**self).delete(alias)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

/// Process-local key store for tests and for hosts without a usable keychain.
/// Keys vanish when the process exits.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyStore {
    inner: Arc<Mutex<HashMap<String, KeyMaterial>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of aliases that currently hold a key.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyStore for InMemoryKeyStore {
    fn get(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError> {
        let map = self.inner.lock().map_err(|err| KeyStoreError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })?;
        Ok(map.get(alias.as_str()).cloned())
    }

    fn create_if_absent(
        &self,
        alias: &KeyAlias,
        material: KeyMaterial,
    ) -> Result<KeyMaterial, KeyStoreError> {
        let mut map = self.inner.lock().map_err(|err| KeyStoreError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })?;
        let stored = map.entry(alias.as_str().to_string()).or_insert(material);
        Ok(stored.clone())
    }

    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError> {
        let mut map = self.inner.lock().map_err(|err| KeyStoreError::Unavailable {
            reason: format!("lock poisoned: {err}"),
        })?;
        map.remove(alias.as_str());
        Ok(())
    }
}
