//! Device node directory watcher
//!
//! Feeds create/delete events of the node directory into the
//! [`NodeRegistry`]. The watcher is an owned component: nothing is observed
//! before [`NodeWatcher::start`] and after [`NodeWatcher::stop`].

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sndplug_core::domain::{NodeEvent, NodeRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors that can occur while starting the node watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WatcherError>;

pub struct NodeWatcher {
    dir: PathBuf,
    registry: Arc<NodeRegistry>,
    watcher: Option<RecommendedWatcher>,
}

impl NodeWatcher {
    pub fn new(dir: PathBuf, registry: Arc<NodeRegistry>) -> Self {
        Self {
            dir,
            registry,
            watcher: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching, then register the nodes already present
    ///
    /// Watching starts first so a node created during the initial listing is
    /// not missed; the registry ignores the duplicate.
    pub fn start(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }

        let registry = Arc::clone(&self.registry);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for node_event in node_events(&event) {
                    registry.apply(&node_event);
                }
            }
            Err(e) => error!(error = %e, "ALSA node watch error"),
        })?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                self.registry.apply(&NodeEvent::Created(name.to_string()));
            }
        }

        info!(
            path = %self.dir.display(),
            nodes = self.registry.len(),
            "ALSA node watcher started"
        );
        self.watcher = Some(watcher);
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            info!(path = %self.dir.display(), "ALSA node watcher stopped");
        }
    }
}

impl Drop for NodeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

/// Translate a filesystem event into node events
pub fn node_events(event: &Event) -> Vec<NodeEvent> {
    let names = || event.paths.iter().filter_map(|p| file_name(p));

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            names().map(NodeEvent::Created).collect()
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            names().map(NodeEvent::Deleted).collect()
        }
        // Paths are reported as [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.iter().filter_map(|p| file_name(p));
            let mut events = Vec::with_capacity(2);
            if let Some(from) = paths.next() {
                events.push(NodeEvent::Deleted(from));
            }
            if let Some(to) = paths.next() {
                events.push(NodeEvent::Created(to));
            }
            events
        }
        _ => {
            debug!(kind = ?event.kind, "Ignoring ALSA directory event");
            Vec::new()
        }
    }
}
