//! Orchestration of the binding map, vault and ledger in response to
//! filesystem events.
//!
//! A pair moves through three states:
//!
//! * `Bound`: both files present, one map entry per direction.
//! * `DeletedPendingRestore`: one side was deleted, the partner sits in the
//!   vault and a ledger entry remembers where.
//! * `Purged`: the retention window passed; trash file, ledger entry and map
//!   entries are gone.
//!
//! All decisions key off path identity, never event order across paths.

use std::{
    path::{Path, PathBuf},
    sync::mpsc::Receiver,
};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::{
    binding::{bind_extraction_outputs, BindingStore, ScanReport},
    config::Config,
    fs::normalize_path,
    logging::{log_coordinator_stats, CoordinatorSnapshot},
    trash::{DeletionEvent, DeletionLedger, PruneReport, TrashVault},
    watch::{FsEvent, FsEventKind, WatchMessage},
    Error, Result,
};

/// Outcome of one handled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing bound at this path, or no pending restore for it.
    Ignored,
    /// The partner was moved to the vault.
    SoftDeleted { id: String, trash_path: PathBuf },
    /// The event concerns a deletion that is already accounted for.
    AlreadyHandled,
    /// The partner came back from the vault.
    Restored { id: String, path: PathBuf },
    /// The pending restore went stale because both sides exist again; the
    /// entry no longer drives restores and its trash copy waits for prune.
    Superseded { id: String },
}

#[derive(Debug)]
pub struct BindingCoordinator {
    bindings: BindingStore,
    vault: TrashVault,
    ledger: DeletionLedger,
    stats: CoordinatorSnapshot,
}

impl BindingCoordinator {
    pub fn new(bindings: BindingStore, vault: TrashVault, ledger: DeletionLedger) -> Self {
        Self {
            bindings,
            vault,
            ledger,
            stats: CoordinatorSnapshot::default(),
        }
    }

    /// Load all stores for `config`. Corrupt documents fail here.
    pub fn open(config: &Config) -> Result<Self> {
        config.ensure_vault_root()?;
        let bindings = BindingStore::load(&config.bindings_path)?;
        let ledger = DeletionLedger::load(&config.ledger_path)?;
        let vault = TrashVault::open(&config.root, &config.vault_root)?;
        let mut coordinator = Self::new(bindings, vault, ledger);
        coordinator.report_inconsistencies();
        coordinator.reconcile();
        Ok(coordinator)
    }

    pub fn bindings(&self) -> &BindingStore {
        &self.bindings
    }

    pub fn ledger(&self) -> &DeletionLedger {
        &self.ledger
    }

    pub fn vault(&self) -> &TrashVault {
        &self.vault
    }

    pub fn bind(&mut self, source: &Path, target: &Path) -> Result<PathBuf> {
        self.bindings.bind(source, target)
    }

    pub fn bind_extraction_outputs(&mut self, config: &Config) -> Result<ScanReport> {
        let exclude = [config.alias_dir.as_path(), config.vault_root.as_path()];
        let ledger = &self.ledger;
        bind_extraction_outputs(
            &mut self.bindings,
            &config.root,
            &config.alias_dir,
            &config.extraction_suffixes,
            &exclude,
            |path| ledger.is_pending(path),
        )
    }

    /// Apply one event. Failures are classified and logged; they never
    /// propagate, so one bad event cannot stop the watch loop.
    pub fn handle(&mut self, event: &FsEvent) -> Option<Transition> {
        self.stats.events_total += 1;
        let outcome = match event.kind {
            FsEventKind::Removed => self.on_removed(&event.path),
            FsEventKind::Created => self.on_created(&event.path),
        };
        match outcome {
            Ok(transition) => {
                match &transition {
                    Transition::Ignored => self.stats.events_ignored += 1,
                    Transition::AlreadyHandled => self.stats.already_handled += 1,
                    Transition::SoftDeleted { .. } => self.stats.soft_deletes += 1,
                    Transition::Restored { .. } => self.stats.restores += 1,
                    Transition::Superseded { .. } => self.stats.superseded += 1,
                }
                Some(transition)
            }
            Err(err) => {
                self.stats.failures += 1;
                log_failure(event, &err);
                None
            }
        }
    }

    /// `Bound` -> `DeletedPendingRestore`: trash the partner of `path`.
    pub fn on_removed(&mut self, path: &Path) -> Result<Transition> {
        let path = normalize_path(path);

        if let Some(entry) = self.ledger.find_by_bound_path(&path).cloned() {
            if !exists(&entry.bound_file) {
                debug!(path = %path.display(), id = %entry.id, "delete of a file already in the vault");
                return Ok(Transition::AlreadyHandled);
            }
            // The file is back on disk, so this is a fresh delete of a live pair.
            self.supersede(&entry)?;
        }

        let Some(partner) = self.bindings.lookup(&path).map(Path::to_path_buf) else {
            debug!(path = %path.display(), "deleted path is not bound");
            return Ok(Transition::Ignored);
        };

        if !exists(&partner) {
            warn!(
                path = %path.display(),
                partner = %partner.display(),
                "partner already gone; nothing to soft delete"
            );
            return Ok(Transition::AlreadyHandled);
        }

        let trashed = match self.vault.soft_delete(&partner) {
            Ok(trashed) => trashed,
            Err(err) if crate::is_not_found(&err) => {
                warn!(partner = %partner.display(), "partner vanished before soft delete");
                return Ok(Transition::AlreadyHandled);
            }
            Err(err) => return Err(err),
        };

        let id = match self
            .ledger
            .record_deletion(&path, &partner, &trashed.token, &trashed.trash_path)
        {
            Ok(id) => id,
            Err(err) => {
                error!(
                    partner = %partner.display(),
                    error = %err,
                    "ledger write failed; moving partner back"
                );
                if let Err(undo) = self.vault.restore(&trashed.trash_path, &partner) {
                    error!(
                        trash = %trashed.trash_path.display(),
                        error = %undo,
                        "partner left in vault without ledger entry"
                    );
                }
                return Err(err);
            }
        };

        info!(
            id = %id,
            deleted = %path.display(),
            partner = %partner.display(),
            trash = %trashed.trash_path.display(),
            "partner soft deleted"
        );
        Ok(Transition::SoftDeleted {
            id,
            trash_path: trashed.trash_path,
        })
    }

    /// `DeletedPendingRestore` -> `Bound`: a deleted path reappeared, bring
    /// its partner back from the most recent matching ledger entry.
    pub fn on_created(&mut self, path: &Path) -> Result<Transition> {
        let path = normalize_path(path);
        if path.is_dir() {
            return Ok(Transition::Ignored);
        }
        let Some(entry) = self.ledger.find_by_deleted_path(&path).cloned() else {
            debug!(path = %path.display(), "created path has no pending restore");
            return Ok(Transition::Ignored);
        };
        if exists(&entry.bound_file) {
            self.supersede(&entry)?;
            return Ok(Transition::Superseded { id: entry.id });
        }
        self.restore_entry(&entry)
    }

    /// Bring live entries in line with the disk after events were missed,
    /// e.g. while the watcher was stopped. An entry whose deleted file is back
    /// is restored, or superseded when its partner also exists. Failures are
    /// logged and leave the entry pending.
    pub fn reconcile(&mut self) -> Vec<Transition> {
        let stale: Vec<DeletionEvent> = self
            .ledger
            .live_entries()
            .filter(|e| exists(&e.deleted_file))
            .cloned()
            .collect();

        let mut transitions = Vec::new();
        for entry in stale {
            let outcome = if exists(&entry.bound_file) {
                self.supersede(&entry)
                    .map(|()| Transition::Superseded { id: entry.id.clone() })
            } else {
                self.restore_entry(&entry)
            };
            match outcome {
                Ok(transition) => transitions.push(transition),
                Err(err) => warn!(id = %entry.id, error = %err, "could not reconcile deletion entry"),
            }
        }
        if !transitions.is_empty() {
            info!(reconciled = transitions.len(), "caught up on missed restores");
        }
        transitions
    }

    fn supersede(&mut self, entry: &DeletionEvent) -> Result<()> {
        self.ledger.supersede(&entry.id)?;
        warn!(
            id = %entry.id,
            deleted = %entry.deleted_file.display(),
            bound = %entry.bound_file.display(),
            trash = %entry.trash_path.display(),
            "deletion entry no longer matches the disk; superseded"
        );
        Ok(())
    }

    /// Restore the partner recorded under `id`, the same way a recreate does.
    pub fn restore_by_id(&mut self, id: &str) -> Result<Transition> {
        let entry = self
            .ledger
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("deletion id {id}")))?;
        self.restore_entry(&entry)
    }

    fn restore_entry(&mut self, entry: &DeletionEvent) -> Result<Transition> {
        self.vault.restore(&entry.trash_path, &entry.bound_file)?;
        self.ledger.remove(&entry.id)?;
        info!(
            id = %entry.id,
            restored = %entry.bound_file.display(),
            trigger = %entry.deleted_file.display(),
            "partner restored"
        );
        Ok(Transition::Restored {
            id: entry.id.clone(),
            path: entry.bound_file.clone(),
        })
    }

    /// `DeletedPendingRestore` -> `Purged` for entries older than `older_than`.
    pub fn prune(&mut self, older_than: chrono::Duration) -> Result<PruneReport> {
        let cutoff = Utc::now() - older_than;
        let report = self.vault.prune(cutoff, &mut self.ledger, &mut self.bindings)?;
        info!(
            purged = report.purged.len(),
            failed = report.failed.len(),
            cutoff = %cutoff,
            "prune finished"
        );
        Ok(report)
    }

    /// Consume events until shutdown or channel close, then run a final prune.
    /// The event being handled when shutdown arrives always completes first.
    pub fn run(&mut self, events: &Receiver<WatchMessage>, retention: chrono::Duration) -> Result<()> {
        loop {
            match events.recv() {
                Ok(WatchMessage::Fs(event)) => {
                    self.handle(&event);
                }
                Ok(WatchMessage::Shutdown) => {
                    info!("shutdown requested");
                    break;
                }
                Err(_) => {
                    info!("event channel closed");
                    break;
                }
            }
        }

        let result = self.prune(retention);
        log_coordinator_stats(self.snapshot());
        result.map(|_| ())
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            bindings: self.bindings.len(),
            pending_restores: self.ledger.live_entries().count(),
            ..self.stats
        }
    }

    fn report_inconsistencies(&self) {
        for entry in self.ledger.live_entries() {
            let paired = self.bindings.lookup(&entry.deleted_file) == Some(entry.bound_file.as_path());
            if !paired {
                warn!(
                    id = %entry.id,
                    deleted = %entry.deleted_file.display(),
                    bound = %entry.bound_file.display(),
                    "ledger entry does not match a registered binding"
                );
            }
        }
    }
}

fn exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

fn log_failure(event: &FsEvent, err: &anyhow::Error) {
    let path = event.path.display();
    match err.downcast_ref::<Error>() {
        Some(Error::Race(msg)) => warn!(path = %path, kind = ?event.kind, "race: {msg}"),
        Some(Error::NotFound(msg)) => warn!(path = %path, kind = ?event.kind, "not found: {msg}"),
        Some(Error::Validation { .. }) => error!(path = %path, kind = ?event.kind, error = %err, "validation failed"),
        _ => error!(path = %path, kind = ?event.kind, error = %err, "i/o failure; skipping pair"),
    }
}
