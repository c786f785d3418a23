use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    fs::{normalize_path, read_document, write_document},
    Error, Result,
};

pub const BINDINGS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct BindingDocument {
    version: u32,
    bindings: BTreeMap<PathBuf, PathBuf>,
}

/// Persisted symmetric path map. Every entry `a -> b` has its mirror `b -> a`.
#[derive(Debug)]
pub struct BindingStore {
    path: PathBuf,
    map: BTreeMap<PathBuf, PathBuf>,
}

impl BindingStore {
    /// Load the binding document at `path`, starting empty when it is absent.
    ///
    /// Malformed or asymmetric content is an [`Error::Validation`]; the caller
    /// must refuse to start rather than overwrite it.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let map = match read_document(&path)? {
            None => BTreeMap::new(),
            Some(bytes) => {
                let doc: BindingDocument = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::validation(&path, e.to_string()))?;
                validate(&path, &doc)?;
                doc.bindings
            }
        };
        debug!(path = %path.display(), entries = map.len(), "binding map loaded");
        Ok(Self { path, map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bound pairs.
    pub fn len(&self) -> usize {
        self.map.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.map.contains_key(path)
    }

    pub fn lookup(&self, path: &Path) -> Option<&Path> {
        self.map.get(path).map(PathBuf::as_path)
    }

    /// Each pair exactly once, smaller path first.
    pub fn pairs(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.map
            .iter()
            .filter(|(a, b)| a < b)
            .map(|(a, b)| (a.as_path(), b.as_path()))
    }

    /// Copy `source` to `target` (or the first free `name_N` variant of it) and
    /// register the pair. Returns the path the copy landed at.
    pub fn bind(&mut self, source: &Path, target: &Path) -> Result<PathBuf> {
        let source = normalize_path(source);
        if !source.is_file() {
            return Err(Error::NotFound(source.display().to_string()).into());
        }

        if let Some(partner) = self.map.get(&source).cloned() {
            if partner.exists() {
                debug!(source = %source.display(), partner = %partner.display(), "already bound");
                return Ok(partner);
            }
            warn!(
                source = %source.display(),
                partner = %partner.display(),
                "dropping stale binding whose partner is gone"
            );
            self.map.remove(&source);
            self.map.remove(&partner);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let target = self.resolve_free(&normalize_path(target));
        fs::copy(&source, &target).map_err(Error::Io)?;

        self.map.insert(source.clone(), target.clone());
        self.map.insert(target.clone(), source.clone());
        self.save()?;
        info!(source = %source.display(), target = %target.display(), "bound");
        Ok(target)
    }

    /// Remove the pair `a <-> b` if it is still registered as such.
    pub fn unbind_pair(&mut self, a: &Path, b: &Path) -> Result<bool> {
        let registered = self.lookup(a) == Some(b) && self.lookup(b) == Some(a);
        if !registered {
            return Ok(false);
        }
        self.map.remove(a);
        self.map.remove(b);
        self.save()?;
        debug!(a = %a.display(), b = %b.display(), "unbound");
        Ok(true)
    }

    fn is_free(&self, candidate: &Path) -> bool {
        !candidate.exists() && !self.map.contains_key(candidate)
    }

    fn resolve_free(&self, target: &Path) -> PathBuf {
        if self.is_free(target) {
            return target.to_path_buf();
        }
        let stem = target
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        let ext = target.extension().map(|e| e.to_os_string());
        let mut counter = 1u32;
        loop {
            let mut name = OsString::from(&stem);
            name.push(format!("_{counter}"));
            if let Some(ext) = &ext {
                name.push(".");
                name.push(ext);
            }
            let candidate = target.with_file_name(name);
            if self.is_free(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    fn save(&self) -> Result<()> {
        let doc = BindingDocument {
            version: BINDINGS_VERSION,
            bindings: self.map.clone(),
        };
        write_document(&self.path, &doc)
    }
}

fn validate(path: &Path, doc: &BindingDocument) -> Result<()> {
    if doc.version != BINDINGS_VERSION {
        return Err(Error::validation(path, format!("unsupported version {}", doc.version)).into());
    }
    for (a, b) in &doc.bindings {
        if !a.is_absolute() || !b.is_absolute() {
            return Err(Error::validation(
                path,
                format!("relative path in binding {} -> {}", a.display(), b.display()),
            )
            .into());
        }
        if a == b {
            return Err(Error::validation(path, format!("{} is bound to itself", a.display())).into());
        }
        if doc.bindings.get(b) != Some(a) {
            return Err(Error::validation(
                path,
                format!("one-way binding {} -> {}", a.display(), b.display()),
            )
            .into());
        }
    }
    Ok(())
}
