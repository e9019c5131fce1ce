//! Recursive filesystem watcher feeding the pipeline

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::PipelineHandle;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Keeps the underlying OS watcher alive; dropping it stops notifications
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for SourceWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceWatcher").field("root", &self.root).finish()
    }
}

impl SourceWatcher {
    /// Watch `config.source_dir` recursively and queue every relevant path
    pub fn start(config: &Config, handle: PipelineHandle) -> Result<Self> {
        let filter = config.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for path in paths_to_enqueue(&event, &filter) {
                        debug!(?path, kind = ?event.kind, "File change detected");
                        if let Err(e) = handle.enqueue(path) {
                            warn!(error = %e, "Dropping notification");
                        }
                    }
                }
                Err(e) => error!(error = %e, "Watch error"),
            },
        )?;

        watcher.watch(&config.source_dir, RecursiveMode::Recursive)?;
        info!(folder = ?config.source_dir, "Watching for new media");

        Ok(Self {
            _watcher: watcher,
            root: config.source_dir.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Paths from a notification that should be re-evaluated
///
/// Creations, content changes and renames are all treated alike. Removals,
/// access events, directories and excluded folders are dropped.
pub fn paths_to_enqueue(event: &Event, config: &Config) -> Vec<PathBuf> {
    let relevant = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    if !relevant {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter(|path| !path.is_dir())
        .filter(|path| !config.is_excluded(path))
        .cloned()
        .collect()
}
