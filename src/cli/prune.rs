//! Implementation of `filebind prune`.

use clap::Args;

use crate::{
    config::{Config, ConfigArgs},
    coordinator::BindingCoordinator,
    Error, Result,
};

#[derive(Debug, Clone, Args, Default)]
pub struct PruneArgs {
    /// Override the retention window, in days
    #[arg(long = "days")]
    pub days: Option<u64>,
}

pub fn execute(config: &ConfigArgs, args: PruneArgs) -> Result<()> {
    let cfg = Config::from_args(config)?;
    let retention = match args.days {
        Some(days) => chrono::Duration::days(
            i64::try_from(days).map_err(|_| Error::Cli(format!("{days} days is out of range")))?,
        ),
        None => cfg.retention,
    };

    let mut coordinator = BindingCoordinator::open(&cfg)?;
    let report = coordinator.prune(retention)?;
    println!(
        "purged {} entries, {} left for retry",
        report.purged.len(),
        report.failed.len()
    );
    Ok(())
}
