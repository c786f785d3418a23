//! Runtime configuration resolved from CLI flags and environment.

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::Args;

use crate::{Error, Result};

pub const DEFAULT_VAULT_DIR: &str = ".binding_trash";
pub const DEFAULT_BINDINGS_FILE: &str = "file_bindings.json";
pub const LEDGER_FILE: &str = "trash_info.json";
pub const DEFAULT_ALIAS_DIR: &str = "alias_folder";
pub const DEFAULT_RETENTION_DAYS: u64 = 7;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_SUFFIXES: [&str; 2] = ["_img", "_tables"];

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Working tree to bind and watch
    #[arg(long = "root", env = "FILEBIND_ROOT", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Soft-delete vault directory, relative to the working tree
    #[arg(long = "vault-dir", default_value = DEFAULT_VAULT_DIR, global = true)]
    pub vault_dir: PathBuf,

    /// Binding map document, relative to the working tree
    #[arg(long = "bindings-file", default_value = DEFAULT_BINDINGS_FILE, global = true)]
    pub bindings_file: PathBuf,

    /// Days a soft-deleted file is kept before pruning
    #[arg(
        long = "retention-days",
        env = "FILEBIND_RETENTION_DAYS",
        default_value_t = DEFAULT_RETENTION_DAYS,
        global = true
    )]
    pub retention_days: u64,
}

impl Default for ConfigArgs {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            vault_dir: PathBuf::from(DEFAULT_VAULT_DIR),
            bindings_file: PathBuf::from(DEFAULT_BINDINGS_FILE),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Canonical working tree root.
    pub root: PathBuf,
    pub vault_root: PathBuf,
    pub bindings_path: PathBuf,
    pub ledger_path: PathBuf,
    pub alias_dir: PathBuf,
    pub extraction_suffixes: Vec<String>,
    pub retention: chrono::Duration,
    pub queue_capacity: usize,
}

impl Config {
    /// Defaults rooted at `root`. The root must exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::from_args(&ConfigArgs {
            root: root.as_ref().to_path_buf(),
            ..ConfigArgs::default()
        })
    }

    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let root = args.root.canonicalize().map_err(|e| {
            Error::Cli(format!(
                "working tree {} is not accessible: {e}",
                args.root.display()
            ))
        })?;
        if !root.is_dir() {
            return Err(Error::Cli(format!("working tree {} is not a directory", root.display())).into());
        }

        let vault_root = root.join(&args.vault_dir);
        let bindings_path = root.join(&args.bindings_file);
        let ledger_path = vault_root.join(LEDGER_FILE);
        let days = i64::try_from(args.retention_days)
            .map_err(|_| Error::Cli(format!("retention of {} days is out of range", args.retention_days)))?;

        Ok(Self {
            alias_dir: root.join(DEFAULT_ALIAS_DIR),
            extraction_suffixes: DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            retention: chrono::Duration::days(days),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            root,
            vault_root,
            bindings_path,
            ledger_path,
        })
    }

    /// Create the vault root if needed; failure here is a startup error.
    pub fn ensure_vault_root(&self) -> Result<()> {
        fs::create_dir_all(&self.vault_root).map_err(|e| {
            Error::Cli(format!(
                "cannot create vault root {}: {e}",
                self.vault_root.display()
            ))
        })?;
        Ok(())
    }
}
