//! Command-line front end; one module per subcommand.

use clap::{CommandFactory, Parser, Subcommand};

use crate::{config::ConfigArgs, logging::LogFormat, Result};

pub mod bindings;
pub mod prune;
pub mod restore;
pub mod watch;

#[derive(Debug, Clone)]
pub enum Command {
    Watch(watch::WatchArgs),
    Restore(restore::RestoreArgs),
    Prune(prune::PruneArgs),
    Bindings,
}

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config: ConfigArgs,
    pub log_format: LogFormat,
    pub command: Command,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config: ConfigArgs::default(),
            log_format: LogFormat::default(),
            command: Command::Watch(watch::WatchArgs::default()),
        }
    }
}

pub fn dispatch(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Watch(w) => watch::execute(&args.config, w),
        Command::Restore(r) => restore::execute(&args.config, r),
        Command::Prune(p) => prune::execute(&args.config, p),
        Command::Bindings => bindings::execute(&args.config),
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "filebind",
    version,
    about = "Keep bound file pairs in sync under deletion, with undo-aware recovery"
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value = "human", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Subcommands>,
}

#[derive(Subcommand, Debug)]
enum Subcommands {
    /// Bind extraction outputs into the alias directory, then watch for
    /// deletions and recreations. This is the default when no subcommand is given.
    Watch(watch::WatchArgs),
    /// List pending restores, or restore one by id.
    Restore(restore::RestoreArgs),
    /// Purge soft-deleted files older than the retention window.
    Prune(prune::PruneArgs),
    /// List registered bindings.
    Bindings,
}

/// Parse CLI arguments into internal representation.
pub fn parse_args<I, S>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let argv: Vec<String> = args.into_iter().map(Into::into).collect();
    let cli = Cli::parse_from(argv);
    let command = match cli.command {
        Some(Subcommands::Watch(args)) => Command::Watch(args),
        Some(Subcommands::Restore(args)) => Command::Restore(args),
        Some(Subcommands::Prune(args)) => Command::Prune(args),
        Some(Subcommands::Bindings) => Command::Bindings,
        None => Command::Watch(watch::WatchArgs::default()),
    };

    Ok(CliArgs {
        config: cli.config,
        log_format: cli.log_format,
        command,
    })
}

/// Build the underlying clap `Command` (useful for help/usage contract tests).
pub fn clap_command() -> clap::Command {
    Cli::command()
}
