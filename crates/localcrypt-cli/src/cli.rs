use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface for the local encryption service.
#[derive(Parser, Debug)]
#[command(
    name = "localcrypt",
    about = "Alias-scoped AES-256-GCM encryption with keys held in the OS keychain",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Encrypt bytes from a file (or stdin) and print the envelope as base64.
    Encrypt {
        /// Alias of the key to use; created on first use.
        #[arg(short, long)]
        alias: String,
        /// Read plaintext from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Decrypt a base64 envelope from a file (or stdin) and write the plaintext to stdout.
    Decrypt {
        /// Alias the envelope was encrypted under.
        #[arg(short, long)]
        alias: String,
        /// Read the base64 envelope from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Round-trip a probe payload through the configured key store.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
