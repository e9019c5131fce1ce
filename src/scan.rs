//! One-shot sweep of the source tree at startup

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pipeline::PipelineHandle;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Media files already present under the source folder
///
/// Excluded folders are pruned; unreadable entries are skipped.
pub fn collect_existing(config: &Config) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(&config.source_dir)
        .into_iter()
        .filter_entry(|e| !config.is_excluded(e.path()))
        .filter_map(|entry| {
            entry
                .inspect_err(|e| warn!(error = %e, "Skipping unreadable entry"))
                .ok()
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| config.is_supported_path(path))
        .collect();

    files.sort();
    debug!(count = files.len(), "Collected existing media");
    files
}

/// Queue every existing media file for processing
///
/// Stops early, without error, once the pipeline is shut down. Returns the
/// number of files queued.
pub fn enqueue_existing(config: &Config, handle: &PipelineHandle) -> Result<usize> {
    let mut queued = 0;
    for path in collect_existing(config) {
        match handle.enqueue(path) {
            Ok(()) => queued += 1,
            Err(Error::PipelineClosed) => {
                info!(queued, "Startup scan stopped by shutdown");
                return Ok(queued);
            }
            Err(e) => return Err(e),
        }
    }
    info!(count = queued, folder = ?config.source_dir, "Queued existing media");
    Ok(queued)
}

/// Run the startup sweep on its own thread
///
/// Enqueueing may block on a bounded queue, so the caller stays free to
/// react to shutdown.
pub fn spawn_sweep(config: Config, handle: PipelineHandle) -> Result<JoinHandle<()>> {
    let sweep = thread::Builder::new()
        .name("startup-scan".into())
        .spawn(move || {
            if let Err(e) = enqueue_existing(&config, &handle) {
                error!(error = %e, "Startup scan aborted");
            }
        })?;
    Ok(sweep)
}
