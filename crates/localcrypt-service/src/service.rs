use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use async_trait::async_trait;
use localcrypt_core::{EncryptionError, Encryptor, KeyAlias, KeyStore};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use tokio::runtime::Handle;
use tracing::{debug, instrument};

use crate::{
    cipher::{self, Envelope},
    key_manager::KeyManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Encrypt,
    Decrypt,
}

/// Alias-scoped encryption service.
///
/// Construct one per process and hand out clones; clones share the key
/// manager. Every calling convention (blocking, future, callback) runs the
/// same code, so results and errors are identical across them.
pub struct LocalEncryption<S: KeyStore, R = OsRng> {
    keys: Arc<KeyManager<S, R>>,
    runtime: Option<Handle>,
}

impl<S: KeyStore, R> Clone for LocalEncryption<S, R> {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
            runtime: self.runtime.clone(),
        }
    }
}

impl<S: KeyStore + 'static> LocalEncryption<S> {
    pub fn new(store: S) -> Self {
        Self::with_rng(store, OsRng)
    }
}

impl<S, R> LocalEncryption<S, R>
where
    S: KeyStore + 'static,
    R: RngCore + CryptoRng + Send + 'static,
{
    /// Draw new keys from `rng` instead of the OS generator.
    pub fn with_rng(store: S, rng: R) -> Self {
        Self {
            keys: Arc::new(KeyManager::with_rng(store, rng)),
            runtime: None,
        }
    }

    /// Run background work on `handle` instead of the ambient runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn key_store(&self) -> &S {
        self.keys.store()
    }

    /// Encrypt on the calling thread. Blocks for key resolution and the cipher.
    pub fn encrypt_blocking(&self, data: &[u8], alias: &str) -> Result<Vec<u8>, EncryptionError> {
        execute(&self.keys, Operation::Encrypt, data, alias)
    }

    /// Decrypt on the calling thread. Blocks for key resolution and the cipher.
    pub fn decrypt_blocking(
        &self,
        envelope: &[u8],
        alias: &str,
    ) -> Result<Vec<u8>, EncryptionError> {
        execute(&self.keys, Operation::Decrypt, envelope, alias)
    }

    /// Encrypt on the blocking pool; the caller's task is never blocked.
    pub async fn encrypt(&self, data: Vec<u8>, alias: &str) -> Result<Vec<u8>, EncryptionError> {
        self.dispatch(Operation::Encrypt, data, alias).await
    }

    /// Decrypt on the blocking pool; the caller's task is never blocked.
    pub async fn decrypt(
        &self,
        envelope: Vec<u8>,
        alias: &str,
    ) -> Result<Vec<u8>, EncryptionError> {
        self.dispatch(Operation::Decrypt, envelope, alias).await
    }

    /// Start encryption in the background and return immediately.
    ///
    /// `on_done` runs exactly once, normally on a worker thread. If the
    /// runtime refuses the work (it has shut down), `on_done` gets a
    /// `CryptoOperation` error on whichever thread dropped the work.
    pub fn encrypt_with<F>(&self, data: Vec<u8>, alias: &str, on_done: F)
    where
        F: FnOnce(Result<Vec<u8>, EncryptionError>) + Send + 'static,
    {
        self.dispatch_with(Operation::Encrypt, data, alias, on_done);
    }

    /// Start decryption in the background and return immediately.
    /// Delivery follows [`LocalEncryption::encrypt_with`].
    pub fn decrypt_with<F>(&self, envelope: Vec<u8>, alias: &str, on_done: F)
    where
        F: FnOnce(Result<Vec<u8>, EncryptionError>) + Send + 'static,
    {
        self.dispatch_with(Operation::Decrypt, envelope, alias, on_done);
    }

    async fn dispatch(
        &self,
        op: Operation,
        payload: Vec<u8>,
        alias: &str,
    ) -> Result<Vec<u8>, EncryptionError> {
        let keys = Arc::clone(&self.keys);
        let alias = alias.to_string();
        let work = move || execute(&keys, op, &payload, &alias);

        let task = match &self.runtime {
            Some(handle) => handle.spawn_blocking(work),
            None => tokio::task::spawn_blocking(work),
        };
        task.await.map_err(|e| EncryptionError::CryptoOperation {
            reason: format!("worker failed: {e}"),
        })?
    }

    fn dispatch_with<F>(&self, op: Operation, payload: Vec<u8>, alias: &str, on_done: F)
    where
        F: FnOnce(Result<Vec<u8>, EncryptionError>) + Send + 'static,
    {
        let keys = Arc::clone(&self.keys);
        let alias = alias.to_string();
        let completion = Completion::new(on_done);
        let work = move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                execute(&keys, op, &payload, &alias)
            }))
            .unwrap_or_else(|_| {
                Err(EncryptionError::CryptoOperation {
                    reason: "worker panicked".to_string(),
                })
            });
            completion.complete(result);
        };

        match self.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(handle) => {
                handle.spawn_blocking(work);
            }
            None => {
                std::thread::spawn(work);
            }
        }
    }
}

/// Owns a callback and guarantees it is called once: with the result, or with
/// an error if the work holding it is dropped without running.
struct Completion<F>
where
    F: FnOnce(Result<Vec<u8>, EncryptionError>),
{
    on_done: Option<F>,
}

impl<F> Completion<F>
where
    F: FnOnce(Result<Vec<u8>, EncryptionError>),
{
    fn new(on_done: F) -> Self {
        Self {
            on_done: Some(on_done),
        }
    }

    fn complete(mut self, result: Result<Vec<u8>, EncryptionError>) {
        if let Some(on_done) = self.on_done.take() {
            on_done(result);
        }
    }
}

impl<F> Drop for Completion<F>
where
    F: FnOnce(Result<Vec<u8>, EncryptionError>),
{
    fn drop(&mut self) {
        if let Some(on_done) = self.on_done.take() {
            debug!("background work dropped before it ran");
            on_done(Err(EncryptionError::CryptoOperation {
                reason: "worker was dropped before running (runtime shut down?)".to_string(),
            }));
        }
    }
}

#[async_trait]
impl<S, R> Encryptor for LocalEncryption<S, R>
where
    S: KeyStore + 'static,
    R: RngCore + CryptoRng + Send + 'static,
{
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    async fn encrypt(&self, data: Vec<u8>, alias: &str) -> Result<Vec<u8>, EncryptionError> {
        LocalEncryption::encrypt(self, data, alias).await
    }

    async fn decrypt(
        &self,
        envelope: Vec<u8>,
        alias: &str,
    ) -> Result<Vec<u8>, EncryptionError> {
        LocalEncryption::decrypt(self, envelope, alias).await
    }
}

/// One unit of work: validate, resolve the key, run the cipher.
/// The key copy is dropped (and wiped) before returning.
#[instrument(skip_all, fields(alias = %alias, op = ?op, len = payload.len()))]
fn execute<S: KeyStore, R: RngCore + CryptoRng>(
    keys: &KeyManager<S, R>,
    op: Operation,
    payload: &[u8],
    alias: &str,
) -> Result<Vec<u8>, EncryptionError> {
    let alias = KeyAlias::new(alias)?;

    match op {
        Operation::Encrypt => {
            let key = keys.resolve_key(&alias)?;
            cipher::encrypt(payload, &key)
        }
        Operation::Decrypt => {
            Envelope::parse(payload)?;
            let key = keys.resolve_key(&alias)?;
            let result = cipher::decrypt(payload, &key);
            if matches!(result, Err(EncryptionError::Integrity)) {
                debug!("authentication failed");
            }
            result
        }
    }
}
