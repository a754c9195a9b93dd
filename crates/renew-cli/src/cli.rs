use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "renew",
    about = "Inspect and maintain stored certificate renewals",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to listing renewals when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List stored renewals, soonest due first.
    List {
        /// Only the renewal with this id (case-insensitive).
        #[arg(long)]
        id: Option<String>,
        /// Only renewals with this friendly name (case-insensitive).
        #[arg(long)]
        name: Option<String>,
    },
    /// Import a renewal document from a file.
    Import { path: PathBuf },
    /// Cancel a renewal and delete its file.
    Cancel { id: String },
    /// Cancel every renewal.
    Clear {
        /// Required; guards against accidental wipes.
        #[arg(long)]
        yes: bool,
    },
    /// Rewrite every renewal so all secrets use the current envelope.
    Encrypt {
        /// Generate a new key first; old envelopes are read with the previous key.
        #[arg(long)]
        rotate_key: bool,
    },
    /// List the option schemas this build understands.
    Plugins,
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
