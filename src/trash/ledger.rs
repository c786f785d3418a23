use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    fs::{read_document, write_document},
    Error, Result,
};

pub const LEDGER_VERSION: u32 = 1;
const ID_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// One soft deletion: `deleted_file` disappeared, so its partner `bound_file`
/// was moved to `trash_path`.
///
/// A superseded entry no longer drives restores: its pair came back to life
/// some other way, and the trash copy is only kept until prune.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletionEvent {
    pub id: String,
    pub deleted_file: PathBuf,
    pub bound_file: PathBuf,
    pub trash_token: String,
    pub trash_path: PathBuf,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub superseded: bool,
}

impl DeletionEvent {
    pub fn is_live(&self) -> bool {
        !self.superseded
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LedgerDocument {
    version: u32,
    entries: BTreeMap<String, DeletionEvent>,
}

/// Persisted journal of soft deletions keyed by a timestamp-derived id, so
/// that key order is chronological order.
#[derive(Debug)]
pub struct DeletionLedger {
    path: PathBuf,
    entries: BTreeMap<String, DeletionEvent>,
}

impl DeletionLedger {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match read_document(&path)? {
            None => BTreeMap::new(),
            Some(bytes) => {
                let doc: LedgerDocument = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::validation(&path, e.to_string()))?;
                validate(&path, &doc)?;
                doc.entries
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "deletion ledger loaded");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&DeletionEvent> {
        self.entries.get(id)
    }

    pub fn record_deletion(
        &mut self,
        deleted_file: &Path,
        bound_file: &Path,
        trash_token: &str,
        trash_path: &Path,
    ) -> Result<String> {
        self.record_deletion_at(deleted_file, bound_file, trash_token, trash_path, Utc::now())
    }

    pub fn record_deletion_at(
        &mut self,
        deleted_file: &Path,
        bound_file: &Path,
        trash_token: &str,
        trash_path: &Path,
        created_at: DateTime<Utc>,
    ) -> Result<String> {
        let id = self.unique_id(created_at);
        let event = DeletionEvent {
            id: id.clone(),
            deleted_file: deleted_file.to_path_buf(),
            bound_file: bound_file.to_path_buf(),
            trash_token: trash_token.to_string(),
            trash_path: trash_path.to_path_buf(),
            created_at,
            superseded: false,
        };
        self.entries.insert(id.clone(), event);
        if let Err(err) = self.save() {
            self.entries.remove(&id);
            return Err(err);
        }
        debug!(id = %id, deleted = %deleted_file.display(), "deletion recorded");
        Ok(id)
    }

    /// Most recent live entry whose `deleted_file` is `path`.
    pub fn find_by_deleted_path(&self, path: &Path) -> Option<&DeletionEvent> {
        self.live_entries().find(|e| e.deleted_file == path)
    }

    /// Most recent live entry that trashed `path`.
    pub fn find_by_bound_path(&self, path: &Path) -> Option<&DeletionEvent> {
        self.live_entries().find(|e| e.bound_file == path)
    }

    /// True while `path` is either side of a live entry.
    pub fn is_pending(&self, path: &Path) -> bool {
        self.live_entries()
            .any(|e| e.deleted_file == path || e.bound_file == path)
    }

    /// Retire entry `id` from restore lookups. Returns false for unknown or
    /// already superseded ids.
    pub fn supersede(&mut self, id: &str) -> Result<bool> {
        match self.entries.get_mut(id) {
            Some(entry) if entry.is_live() => entry.superseded = true,
            _ => return Ok(false),
        }
        if let Err(err) = self.save() {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.superseded = false;
            }
            return Err(err);
        }
        debug!(id, "deletion entry superseded");
        Ok(true)
    }

    pub fn remove(&mut self, id: &str) -> Result<Option<DeletionEvent>> {
        let Some(removed) = self.entries.remove(id) else {
            return Ok(None);
        };
        if let Err(err) = self.save() {
            self.entries.insert(id.to_string(), removed);
            return Err(err);
        }
        debug!(id, "deletion entry removed");
        Ok(Some(removed))
    }

    pub fn entries_newest_first(&self) -> impl Iterator<Item = &DeletionEvent> {
        self.entries.values().rev()
    }

    pub fn live_entries(&self) -> impl Iterator<Item = &DeletionEvent> {
        self.entries_newest_first().filter(|e| e.is_live())
    }

    /// Entries created strictly before `cutoff`, oldest first.
    pub fn created_before(&self, cutoff: DateTime<Utc>) -> Vec<DeletionEvent> {
        self.entries
            .values()
            .filter(|e| e.created_at < cutoff)
            .cloned()
            .collect()
    }

    fn unique_id(&self, at: DateTime<Utc>) -> String {
        let base = at.format(ID_FORMAT).to_string();
        if !self.entries.contains_key(&base) {
            return base;
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("{base}_{n:03}");
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn save(&self) -> Result<()> {
        let doc = LedgerDocument {
            version: LEDGER_VERSION,
            entries: self.entries.clone(),
        };
        write_document(&self.path, &doc)
    }
}

fn validate(path: &Path, doc: &LedgerDocument) -> Result<()> {
    if doc.version != LEDGER_VERSION {
        return Err(Error::validation(path, format!("unsupported version {}", doc.version)).into());
    }
    let vault_root = path.parent();
    for (id, entry) in &doc.entries {
        if *id != entry.id {
            return Err(Error::validation(path, format!("entry key {id} does not match id {}", entry.id)).into());
        }
        for p in [&entry.deleted_file, &entry.bound_file, &entry.trash_path] {
            if !p.is_absolute() {
                return Err(Error::validation(path, format!("entry {id} has relative path {}", p.display())).into());
            }
        }
        if let Some(vault_root) = vault_root {
            if !entry.trash_path.starts_with(vault_root) {
                return Err(Error::validation(
                    path,
                    format!("entry {id} trash path {} is outside the vault", entry.trash_path.display()),
                )
                .into());
            }
        }
    }
    Ok(())
}
