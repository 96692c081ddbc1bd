use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// Environment override for the key store backend.
pub const BACKEND_ENV: &str = "LOCALCRYPT_BACKEND";
pub const DEFAULT_KEYRING_SERVICE: &str = "localcrypt";

/// Where keys are kept.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// OS keychain.
    #[default]
    Keyring,
    /// One key file per alias under `key_dir`.
    File,
}

impl FromStr for Backend {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Backend::Keyring),
            "file" => Ok(Backend::File),
            "memory" => Err(color_eyre::eyre::eyre!(
                "the memory backend is not available here: keys would be lost when the command exits"
            )),
            other => Err(color_eyre::eyre::eyre!(
                "unknown backend {other:?} (expected keyring or file)"
            )),
        }
    }
}

/// User-level configuration loaded from `~/.config/localcrypt/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Key store backend.
    pub backend: Option<Backend>,
    /// Override for the key directory (file backend).
    pub key_dir: Option<PathBuf>,
    /// Service name keychain entries are filed under.
    pub keyring_service: Option<String>,
}

impl Config {
    /// Backend to use, honoring `LOCALCRYPT_BACKEND` over the file.
    pub fn backend(&self) -> Result<Backend> {
        match env::var(BACKEND_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(self.backend.unwrap_or_default()),
        }
    }

    pub fn keyring_service(&self) -> &str {
        self.keyring_service
            .as_deref()
            .unwrap_or(DEFAULT_KEYRING_SERVICE)
    }

    /// Copy with every optional setting that has a default spelled out.
    pub fn with_defaults(&self) -> Config {
        Config {
            backend: Some(self.backend.unwrap_or_default()),
            key_dir: self.key_dir.clone(),
            keyring_service: Some(self.keyring_service().to_string()),
        }
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("localcrypt").join("config.toml"))
}

/// Write the config with defaults filled in, unless a file already exists.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    let path = default_path()?;
    write_to_path_if_missing(config, &path)?;
    Ok(path)
}

fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(&config.with_defaults())?;
    fs::write(path, body)?;
    Ok(())
}
