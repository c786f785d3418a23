//! Implementation of `filebind restore [ID]`.

use std::path::Path;

use clap::Args;

use crate::{
    config::{Config, ConfigArgs},
    coordinator::{BindingCoordinator, Transition},
    trash::DeletionLedger,
    Result,
};

#[derive(Debug, Clone, Args, Default)]
pub struct RestoreArgs {
    /// Deletion id to restore; lists pending restores when omitted
    pub id: Option<String>,
}

pub fn execute(config: &ConfigArgs, args: RestoreArgs) -> Result<()> {
    let cfg = Config::from_args(config)?;
    let mut coordinator = BindingCoordinator::open(&cfg)?;

    match args.id {
        None => {
            print!("{}", format_listing(coordinator.ledger()));
            Ok(())
        }
        Some(id) => {
            if let Transition::Restored { path, .. } = coordinator.restore_by_id(&id)? {
                println!("restored {}", path.display());
            }
            Ok(())
        }
    }
}

/// Pending restores, most recent first.
pub fn format_listing(ledger: &DeletionLedger) -> String {
    if ledger.is_empty() {
        return "no restorable deletions\n".to_string();
    }
    let mut out = String::new();
    for entry in ledger.entries_newest_first() {
        out.push_str(&format!(
            "ID: {}\n  time: {}\n  deleted file: {}\n  bound file: {}\n",
            entry.id,
            entry.created_at.to_rfc3339(),
            file_name(&entry.deleted_file),
            file_name(&entry.bound_file),
        ));
        if !entry.is_live() {
            out.push_str("  status: superseded, kept until prune\n");
        }
    }
    out
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
