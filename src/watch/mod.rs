//! Adapter from OS filesystem notifications (`notify`) to a bounded channel of
//! create/remove events consumed by a single coordinator.

use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, SyncSender},
};

use notify::{
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tracing::{debug, info, warn};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsEventKind::Created,
            path: path.into(),
        }
    }

    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsEventKind::Removed,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchMessage {
    Fs(FsEvent),
    Shutdown,
}

/// Paths whose notifications never reach the coordinator: the vault subtree
/// and the binding document with its temp sibling.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    ignored_trees: Vec<PathBuf>,
    ignored_files: Vec<PathBuf>,
}

impl PathFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_tree(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ignored_trees.push(dir.into());
        self
    }

    pub fn ignore_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.ignored_files.push(file.into());
        self
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignored_trees.iter().any(|t| path.starts_with(t))
            || self.ignored_files.iter().any(|f| path == f)
    }
}

/// Map one `notify` event onto zero or more create/remove events.
///
/// Renames count as remove (source) and create (destination); file-manager
/// trash and undo are renames. Inotify reports a rename three times (from, to,
/// both), so only the one-sided halves are used. Directory events are dropped.
pub fn translate(event: &Event, filter: &PathFilter) -> Vec<FsEvent> {
    let mapped: Vec<FsEvent> = match &event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(FsEvent::created)
            .collect(),
        EventKind::Remove(_) => event.paths.iter().map(FsEvent::removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().map(FsEvent::removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(FsEvent::created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| {
                if p.exists() {
                    FsEvent::created(p)
                } else {
                    FsEvent::removed(p)
                }
            })
            .collect(),
        _ => Vec::new(),
    };
    mapped
        .into_iter()
        .filter(|e| !filter.is_ignored(&e.path))
        .collect()
}

/// Cloneable handle that asks the consumer loop to stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: SyncSender<WatchMessage>,
}

impl ShutdownHandle {
    pub fn request(&self) {
        // The consumer may already be gone.
        let _ = self.tx.send(WatchMessage::Shutdown);
    }
}

/// Live recursive watch over a working tree. Dropping it stops notifications.
pub struct EventWatcher {
    _watcher: RecommendedWatcher,
    tx: SyncSender<WatchMessage>,
    root: PathBuf,
}

impl std::fmt::Debug for EventWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWatcher").field("root", &self.root).finish()
    }
}

impl EventWatcher {
    /// Start watching `root` recursively. Events are delivered in arrival
    /// order through a channel bounded at `capacity`.
    pub fn start(
        root: &Path,
        filter: PathFilter,
        capacity: usize,
    ) -> Result<(Self, Receiver<WatchMessage>)> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let sink = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for fs_event in translate(&event, &filter) {
                    debug!(kind = ?fs_event.kind, path = %fs_event.path.display(), "fs event");
                    if sink.send(WatchMessage::Fs(fs_event)).is_err() {
                        return;
                    }
                }
            }
            Err(err) => warn!(error = %err, "watch error"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), capacity, "watching");

        Ok((
            Self {
                _watcher: watcher,
                tx,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
