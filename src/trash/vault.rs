use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    binding::BindingStore,
    fs::{move_file, normalize_path, remove_empty_dirs},
    trash::DeletionLedger,
    Error, Result,
};

const TOKEN_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";
const EXTERNAL_DIR: &str = "_external";

/// Where a soft-deleted file went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashedFile {
    pub token: String,
    pub trash_path: PathBuf,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub purged: Vec<String>,
    pub failed: Vec<String>,
}

/// Retention area laid out as `<root>/<token>/<path relative to the tree>`.
#[derive(Debug, Clone)]
pub struct TrashVault {
    tree_root: PathBuf,
    root: PathBuf,
}

impl TrashVault {
    /// Open (creating if needed) the vault at `root` for files of `tree_root`.
    pub fn open(tree_root: impl AsRef<Path>, root: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            tree_root: normalize_path(tree_root.as_ref()),
            root: normalize_path(root.as_ref()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Move `path` into a fresh token directory. Fails with an I/O error when
    /// the source is missing.
    pub fn soft_delete(&self, path: &Path) -> Result<TrashedFile> {
        if let Err(err) = fs::symlink_metadata(path) {
            return Err(Error::Io(err).into());
        }

        let (token, token_dir) = self.create_token_dir()?;
        let trash_path = token_dir.join(self.relative_in_tree(path));
        if let Err(err) = stage(path, &trash_path) {
            remove_empty_dirs(trash_path.parent().unwrap_or(&token_dir), &token_dir);
            return Err(err);
        }

        debug!(path = %path.display(), trash = %trash_path.display(), "soft deleted");
        Ok(TrashedFile { token, trash_path })
    }

    /// Move `trash_path` back to `original`. Never overwrites an existing file.
    pub fn restore(&self, trash_path: &Path, original: &Path) -> Result<()> {
        if !trash_path.is_file() {
            return Err(Error::NotFound(format!("trash file {}", trash_path.display())).into());
        }
        if original.exists() {
            return Err(Error::Race(format!(
                "restore target {} already exists",
                original.display()
            ))
            .into());
        }
        if let Some(parent) = original.parent() {
            fs::create_dir_all(parent)?;
        }
        move_file(trash_path, original)?;

        if let (Some(parent), Some(token_dir)) = (trash_path.parent(), self.token_dir_of(trash_path)) {
            remove_empty_dirs(parent, &token_dir);
        }
        debug!(trash = %trash_path.display(), original = %original.display(), "restored");
        Ok(())
    }

    /// Permanently delete a trashed file and its empty token directory.
    /// A file that is already gone counts as purged.
    pub fn purge(&self, trash_path: &Path) -> Result<()> {
        if !self.contains(trash_path) {
            return Err(Error::Race(format!(
                "refusing to purge {} outside the vault",
                trash_path.display()
            ))
            .into());
        }
        match fs::remove_file(trash_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(trash = %trash_path.display(), "trash file already gone");
            }
            Err(err) => return Err(Error::Io(err).into()),
        }
        if let (Some(parent), Some(token_dir)) = (trash_path.parent(), self.token_dir_of(trash_path)) {
            remove_empty_dirs(parent, &token_dir);
        }
        Ok(())
    }

    /// Purge every ledger entry created before `cutoff`: trash file, ledger
    /// entry and binding pair. The ledger is the index; the vault directory is
    /// never scanned. Entries whose trash file cannot be removed are kept.
    pub fn prune(
        &self,
        cutoff: DateTime<Utc>,
        ledger: &mut DeletionLedger,
        bindings: &mut BindingStore,
    ) -> Result<PruneReport> {
        let mut report = PruneReport::default();
        for entry in ledger.created_before(cutoff) {
            if let Err(err) = self.purge(&entry.trash_path) {
                error!(id = %entry.id, trash = %entry.trash_path.display(), error = %err, "purge failed; keeping entry");
                report.failed.push(entry.id);
                continue;
            }
            // A superseded entry's pair is live again; only its trash copy expires.
            if entry.is_live() {
                bindings.unbind_pair(&entry.deleted_file, &entry.bound_file)?;
            }
            ledger.remove(&entry.id)?;
            info!(
                id = %entry.id,
                deleted = %entry.deleted_file.display(),
                bound = %entry.bound_file.display(),
                "purged"
            );
            report.purged.push(entry.id);
        }
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "prune left entries behind");
        }
        Ok(report)
    }

    fn create_token_dir(&self) -> Result<(String, PathBuf)> {
        let base = Utc::now().format(TOKEN_FORMAT).to_string();
        let mut token = base.clone();
        let mut n = 0u32;
        loop {
            let dir = self.root.join(&token);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok((token, dir)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    n += 1;
                    token = format!("{base}_{n:03}");
                }
                Err(err) => return Err(Error::Io(err).into()),
            }
        }
    }

    fn relative_in_tree(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(&self.tree_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let mut rel = PathBuf::from(EXTERNAL_DIR);
                rel.extend(
                    path.components()
                        .filter(|c| matches!(c, Component::Normal(_))),
                );
                rel
            }
        }
    }

    fn token_dir_of(&self, trash_path: &Path) -> Option<PathBuf> {
        let rel = trash_path.strip_prefix(&self.root).ok()?;
        let token = rel.components().next()?;
        Some(self.root.join(token))
    }
}

fn stage(path: &Path, trash_path: &Path) -> Result<()> {
    if let Some(parent) = trash_path.parent() {
        fs::create_dir_all(parent)?;
    }
    move_file(path, trash_path)
}
