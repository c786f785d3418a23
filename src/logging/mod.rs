//! Logging initialization using `tracing` and `tracing-subscriber`.

use clap::ValueEnum;
use tracing::info;
use tracing_subscriber::{fmt, util::SubscriberInitExt, EnvFilter};

use crate::Result;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

/// Counters kept by the coordinator and emitted when the watch loop ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinatorSnapshot {
    pub bindings: usize,
    pub pending_restores: usize,
    pub events_total: u64,
    pub events_ignored: u64,
    pub already_handled: u64,
    pub superseded: u64,
    pub soft_deletes: u64,
    pub restores: u64,
    pub failures: u64,
}

/// Install the process-wide subscriber for `--log-format`. Verbosity comes
/// from `RUST_LOG`, falling back to `info`. JSON output emits one object per
/// event. Only the first call in a process installs anything, so repeated
/// `run` calls in tests share one subscriber.
pub fn init_logging(format: LogFormat) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter())
        .with_target(false);

    // Losing a race against another initializer is harmless.
    let _ = match format {
        LogFormat::Human => builder.finish().try_init(),
        LogFormat::Json => builder.json().finish().try_init(),
    };
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Emit the coordinator counters as one structured record.
pub fn log_coordinator_stats(snapshot: CoordinatorSnapshot) {
    info!(
        target = "filebind::coordinator",
        bindings = snapshot.bindings,
        pending_restores = snapshot.pending_restores,
        events_total = snapshot.events_total,
        events_ignored = snapshot.events_ignored,
        already_handled = snapshot.already_handled,
        superseded = snapshot.superseded,
        soft_deletes = snapshot.soft_deletes,
        restores = snapshot.restores,
        failures = snapshot.failures,
        "coordinator_stats"
    );
}
