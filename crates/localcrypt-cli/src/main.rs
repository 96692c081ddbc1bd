mod cli;
mod config;
mod keystore;

use std::{
    fs,
    io::{self, Read, Write},
    path::Path,
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use localcrypt_core::{Encryptor, KeyAlias, KeyStore};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

const HEALTH_PROBE_ALIAS: &str = "localcrypt/health-probe";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        Command::Encrypt { alias, input } => run_encrypt(&alias, input.as_deref(), &config).await?,
        Command::Decrypt { alias, input } => run_decrypt(&alias, input.as_deref(), &config).await?,
        Command::Health => run_health_check(&config).await?,
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so stdout carries only envelopes and plaintext.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("localcrypt {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

async fn run_encrypt(alias: &str, input: Option<&Path>, config: &config::Config) -> Result<()> {
    let service = keystore::service_from_config(config)?;
    let plaintext = read_input(input)?;
    let envelope = encrypt_to_base64(&service, plaintext, alias).await?;
    println!("{envelope}");
    Ok(())
}

async fn run_decrypt(alias: &str, input: Option<&Path>, config: &config::Config) -> Result<()> {
    let service = keystore::service_from_config(config)?;
    let encoded = read_input(input)?;
    let plaintext = decrypt_from_base64(&service, &encoded, alias).await?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(&plaintext)?;
    stdout.flush()?;
    Ok(())
}

async fn encrypt_to_base64(
    encryptor: &(dyn Encryptor + Send + Sync),
    plaintext: Vec<u8>,
    alias: &str,
) -> Result<String> {
    let envelope = encryptor
        .encrypt(plaintext, alias)
        .await
        .wrap_err_with(|| format!("encrypt under alias {alias:?} failed"))?;
    Ok(STANDARD.encode(envelope))
}

async fn decrypt_from_base64(
    encryptor: &(dyn Encryptor + Send + Sync),
    encoded: &[u8],
    alias: &str,
) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(encoded).wrap_err("envelope is not base64 text")?;
    let envelope = STANDARD
        .decode(text.trim())
        .wrap_err("envelope is not valid base64")?;
    encryptor
        .decrypt(envelope, alias)
        .await
        .wrap_err_with(|| format!("decrypt under alias {alias:?} failed"))
}

/// Checks the configured store answers, round-trips a payload through it and
/// removes the key it created.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let service = keystore::service_from_config(config)?;
    run_service_health(&service, service.key_store()).await?;
    println!("Key store: ok");
    Ok(())
}

async fn run_service_health(
    encryptor: &(dyn Encryptor + Send + Sync),
    store: &dyn KeyStore,
) -> Result<()> {
    if !store.is_available() {
        color_eyre::eyre::bail!("key store is unavailable");
    }
    let payload = b"ok";
    let envelope = encryptor
        .encrypt(payload.to_vec(), HEALTH_PROBE_ALIAS)
        .await
        .wrap_err("health probe encrypt failed")?;
    let round_trip = encryptor
        .decrypt(envelope, HEALTH_PROBE_ALIAS)
        .await
        .wrap_err("health probe decrypt failed")?;

    let alias = KeyAlias::new(HEALTH_PROBE_ALIAS)?;
    store
        .delete(&alias)
        .wrap_err("health probe key cleanup failed")?;

    if round_trip != payload {
        color_eyre::eyre::bail!("key store round-trip failed");
    }
    info!(encryptor = encryptor.name(), "health probe passed");
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            fs::read(path).wrap_err_with(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            io::stdin().lock().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}
