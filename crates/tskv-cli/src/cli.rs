use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tskv",
    about = "Timestamped, versioned key-value storage on etcd or redb",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Backend to use; inferred from --db / --etcd when omitted
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,

    /// Comma-separated etcd endpoints
    #[arg(long, global = true, env = "TSKV_ETCD_ENDPOINTS", value_delimiter = ',')]
    pub etcd: Vec<String>,

    /// Path of the embedded database file
    #[arg(long, global = true, env = "TSKV_DB")]
    pub db: Option<PathBuf>,

    #[arg(long, global = true, env = "TSKV_NAMESPACE")]
    pub namespace: Option<String>,

    /// TOML backend configuration
    #[arg(long, global = true, env = "TSKV_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    Etcd,
    Embedded,
}

#[derive(Subcommand)]
pub enum Command {
    /// Get the last set value of a key
    Get(GetArgs),
    /// Set a key
    Set(SetArgs),
    /// Roll the value of a key back to a tag
    Rollback(RollbackArgs),
    /// List the tags of a key
    List(ListArgs),
    /// List the folders one level below a prefix
    Keys(KeysArgs),
    /// Take an advisory lock
    Lock(LockArgs),
    /// Release an advisory lock
    Unlock(UnlockArgs),
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub key: String,
    /// File holding the value, or `-` for stdin
    pub value: String,
    /// Tag for this version; defaults to the current time in nanoseconds
    #[arg(long)]
    pub tag: Option<String>,
}

#[derive(Args)]
pub struct RollbackArgs {
    pub key: String,
    #[arg(long)]
    pub tag: String,
}

#[derive(Args)]
pub struct ListArgs {
    pub key: String,
}

#[derive(Args)]
pub struct KeysArgs {
    pub prefix: String,
    #[arg(long, default_value = "/")]
    pub separator: String,
}

#[derive(Args)]
pub struct LockArgs {
    pub key: String,
    /// Lock owner recorded in the lock; defaults to a random UUID
    #[arg(long)]
    pub value: Option<String>,
}

#[derive(Args)]
pub struct UnlockArgs {
    pub key: String,
}
