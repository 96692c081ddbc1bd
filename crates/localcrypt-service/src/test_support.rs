use std::{
    io,
    sync::atomic::{AtomicUsize, Ordering},
};

use localcrypt_core::{InMemoryKeyStore, KeyAlias, KeyMaterial, KeyStore, KeyStoreError};
use rand::{CryptoRng, RngCore};

/// In-memory store that counts calls reaching `create_if_absent`.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: InMemoryKeyStore,
    creates: AtomicUsize,
}

impl CountingStore {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryKeyStore {
        &self.inner
    }
}

impl KeyStore for CountingStore {
    fn get(&self, alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError> {
        self.inner.get(alias)
    }

    fn create_if_absent(
        &self,
        alias: &KeyAlias,
        material: KeyMaterial,
    ) -> Result<KeyMaterial, KeyStoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create_if_absent(alias, material)
    }

    fn delete(&self, alias: &KeyAlias) -> Result<(), KeyStoreError> {
        self.inner.delete(alias)
    }
}

/// Store whose every call fails with a fixed error.
#[derive(Debug)]
pub struct FailingStore {
    error: KeyStoreError,
}

impl FailingStore {
    pub fn unavailable(reason: &str) -> Self {
        Self {
            error: KeyStoreError::Unavailable {
                reason: reason.to_string(),
            },
        }
    }

    pub fn corrupted() -> Self {
        Self {
            error: KeyStoreError::Corrupted {
                alias: "any".to_string(),
                reason: "expected 32 bytes, got 3".to_string(),
            },
        }
    }
}

impl KeyStore for FailingStore {
    fn get(&self, _alias: &KeyAlias) -> Result<Option<KeyMaterial>, KeyStoreError> {
        Err(self.error.clone())
    }

    fn create_if_absent(
        &self,
        _alias: &KeyAlias,
        _material: KeyMaterial,
    ) -> Result<KeyMaterial, KeyStoreError> {
        Err(self.error.clone())
    }

    fn delete(&self, _alias: &KeyAlias) -> Result<(), KeyStoreError> {
        Err(self.error.clone())
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Random source whose every fallible draw fails, as a dead entropy device would.
#[derive(Debug, Clone, Copy)]
pub struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        panic!("entropy source unavailable")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("entropy source unavailable")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("entropy source unavailable")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
        Err(rand::Error::new(io::Error::other("entropy source unavailable")))
    }
}

impl CryptoRng for FailingRng {}
