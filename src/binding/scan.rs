//! Discovery of extraction-output directories (`report_img/`, `deck_tables/`,
//! ...) and bulk binding of their files into the alias directory.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{binding::BindingStore, Result};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub directories: usize,
    pub bound: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Top-level directories of `root` whose name ends with one of `suffixes`,
/// sorted by name. `exclude` entries are never returned.
pub fn extraction_dirs(root: &Path, suffixes: &[String], exclude: &[&Path]) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            continue;
        }
        if exclude.iter().any(|ex| entry.path() == *ex) {
            continue;
        }
        dirs.push(entry.into_path());
    }
    Ok(dirs)
}

/// Bind every regular file directly inside the extraction directories to a
/// same-named file in `alias_dir`. A file that fails to bind is logged and
/// skipped. Files for which `pending` holds belong to an unfinished soft
/// delete and are left alone.
pub fn bind_extraction_outputs(
    store: &mut BindingStore,
    root: &Path,
    alias_dir: &Path,
    suffixes: &[String],
    exclude: &[&Path],
    pending: impl Fn(&Path) -> bool,
) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    for dir in extraction_dirs(root, suffixes, exclude)? {
        report.directories += 1;
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                    report.failed += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if pending(entry.path()) {
                debug!(source = %entry.path().display(), "soft delete pending; not rebinding");
                report.skipped += 1;
                continue;
            }
            let target = alias_dir.join(entry.file_name());
            match store.bind(entry.path(), &target) {
                Ok(_) => report.bound += 1,
                Err(err) => {
                    warn!(source = %entry.path().display(), error = %err, "bind failed");
                    report.failed += 1;
                }
            }
        }
    }
    info!(
        directories = report.directories,
        bound = report.bound,
        skipped = report.skipped,
        failed = report.failed,
        alias_dir = %alias_dir.display(),
        "extraction outputs bound"
    );
    Ok(report)
}
