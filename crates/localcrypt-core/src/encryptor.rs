use async_trait::async_trait;

use crate::error::EncryptionError;

/// Contract for any alias-scoped authenticated encryption provider.
///
/// Output of `encrypt` is a self-contained envelope that `decrypt` accepts
/// under the same alias.
#[async_trait]
pub trait Encryptor: Send + Sync {
    /// Short name used for logging and health output.
    fn name(&self) -> &'static str;

    /// Encrypt `data` under the key for `alias`, creating the key on first use.
    async fn encrypt(&self, data: Vec<u8>, alias: &str) -> Result<Vec<u8>, EncryptionError>;

    /// Decrypt an envelope produced by `encrypt` for the same alias.
    async fn decrypt(&self, envelope: Vec<u8>, alias: &str)
        -> Result<Vec<u8>, EncryptionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Identity "encryptor" that only checks alias handling through the trait object.
    struct Passthrough;

    #[async_trait]
    impl Encryptor for Passthrough {
        fn name(&self) -> &'static str {
            "passthrough"
        }

        async fn encrypt(&self, data: Vec<u8>, alias: &str) -> Result<Vec<u8>, EncryptionError> {
            crate::KeyAlias::new(alias)?;
            Ok(data)
        }

        async fn decrypt(
            &self,
            envelope: Vec<u8>,
            alias: &str,
        ) -> Result<Vec<u8>, EncryptionError> {
            crate::KeyAlias::new(alias)?;
            Ok(envelope)
        }
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let encryptor: &(dyn Encryptor + Send + Sync) = &Passthrough;
        let out = encryptor
            .encrypt(b"abc".to_vec(), "alias")
            .await
            .expect("encrypt");
        assert_eq!(out, b"abc");
        assert_eq!(encryptor.name(), "passthrough");

        let err = encryptor
            .decrypt(out, "")
            .await
            .expect_err("empty alias should fail");
        assert!(matches!(err, EncryptionError::InvalidInput { .. }));
    }
}
