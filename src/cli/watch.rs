//! Implementation of the default `filebind watch` mode.

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::{
    config::{Config, ConfigArgs, DEFAULT_ALIAS_DIR, DEFAULT_QUEUE_CAPACITY, DEFAULT_SUFFIXES},
    coordinator::BindingCoordinator,
    fs::temp_path_for,
    watch::{EventWatcher, PathFilter},
    Error, Result,
};

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Directory receiving bound copies, relative to the working tree
    #[arg(long = "alias-dir", default_value = DEFAULT_ALIAS_DIR)]
    pub alias_dir: PathBuf,

    /// Directory-name suffix marking extraction outputs (repeatable)
    #[arg(long = "suffix", default_values_t = DEFAULT_SUFFIXES.map(String::from))]
    pub suffixes: Vec<String>,

    /// Skip binding extraction outputs and only watch
    #[arg(long = "no-scan")]
    pub no_scan: bool,

    /// Capacity of the queue between the OS watcher and the coordinator
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

impl Default for WatchArgs {
    fn default() -> Self {
        Self {
            alias_dir: PathBuf::from(DEFAULT_ALIAS_DIR),
            suffixes: DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            no_scan: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Resolve the watch configuration from global and watch-specific flags.
pub fn resolve_config(config: &ConfigArgs, args: &WatchArgs) -> Result<Config> {
    let mut cfg = Config::from_args(config)?;
    cfg.alias_dir = cfg.root.join(&args.alias_dir);
    cfg.extraction_suffixes = args.suffixes.clone();
    cfg.queue_capacity = args.queue_capacity;
    Ok(cfg)
}

pub fn execute(config: &ConfigArgs, args: WatchArgs) -> Result<()> {
    let cfg = resolve_config(config, &args)?;
    let mut coordinator = BindingCoordinator::open(&cfg)?;

    if !args.no_scan {
        coordinator.bind_extraction_outputs(&cfg)?;
    }

    let filter = PathFilter::new()
        .ignore_tree(&cfg.vault_root)
        .ignore_file(&cfg.bindings_path)
        .ignore_file(temp_path_for(&cfg.bindings_path));
    let (watcher, events) = EventWatcher::start(&cfg.root, filter, cfg.queue_capacity)?;

    let shutdown = watcher.shutdown_handle();
    ctrlc::set_handler(move || shutdown.request())
        .map_err(|e| Error::Cli(format!("failed to install signal handler: {e}")))?;

    info!(
        root = %cfg.root.display(),
        retention_days = cfg.retention.num_days(),
        "filebind active; press Ctrl+C to stop"
    );
    let result = coordinator.run(&events, cfg.retention);
    drop(events);
    drop(watcher);
    result
}
