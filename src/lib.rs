use std::path::PathBuf;

use thiserror::Error;

pub mod binding;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod fs;
pub mod logging;
pub mod trash;
pub mod watch;

pub type Result<T> = anyhow::Result<T>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid persisted document {path}: {reason}")]
    Validation { path: PathBuf, reason: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("path not in expected state: {0}")]
    Race(String),
    #[error("serialization error")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("cli error: {0}")]
    Cli(String),
}

impl Error {
    pub fn validation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// True when `err` carries an I/O "not found", either wrapped in [`Error::Io`]
/// or as a bare `std::io::Error`.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    let io = match err.downcast_ref::<Error>() {
        Some(Error::Io(io)) => Some(io),
        Some(Error::NotFound(_)) => return true,
        Some(_) => None,
        None => err.downcast_ref::<std::io::Error>(),
    };
    io.is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

/// Entry point for the library, called by the CLI thin wrapper.
pub fn run<I, S>(args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let cli_args = cli::parse_args(args.into_iter().map(Into::into))?;
    logging::init_logging(cli_args.log_format)?;
    cli::dispatch(cli_args)
}
