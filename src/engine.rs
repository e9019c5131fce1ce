//! Per-file organize decision and mutation
//!
//! For one changed path the engine decides, in order:
//! - the path is gone (or not a regular file): nothing to do
//! - the extension is not accepted: nothing to do
//! - plan the destination folder and collision-free file name
//! - the destination folder already holds identical content: leave the source in place
//! - otherwise create the folder and move the file
//!
//! Only the last step mutates the filesystem. The engine is not
//! synchronized; callers must serialize `process` calls (the pipeline runs
//! a single worker for that reason).

use crate::cache::HashCache;
use crate::config::Config;
use crate::error::Result;
use crate::fsops::{self, MoveMethod};
use crate::planner::DestinationPlanner;
use crate::time::CaptureDateResolver;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{Level, debug, info, span};

/// What happened to one pipeline item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Path vanished before processing, or is not a regular file
    Missing,
    /// Extension outside the accepted set
    Unsupported,
    /// Identical content already filed; source left in place
    Duplicate { existing: PathBuf },
    /// File was moved into the archive
    Moved {
        destination: PathBuf,
        /// A `-<n>` collision suffix was added
        renamed: bool,
        method: MoveMethod,
    },
    /// Dry run - would have moved
    DryRun { destination: PathBuf },
}

/// Processing statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub moved: AtomicUsize,
    pub skipped: AtomicUsize,
    pub duplicates: AtomicUsize,
    pub failed: AtomicUsize,
}

impl Clone for ProcessingStats {
    fn clone(&self) -> Self {
        Self {
            moved: AtomicUsize::new(self.moved.load(Ordering::Relaxed)),
            skipped: AtomicUsize::new(self.skipped.load(Ordering::Relaxed)),
            duplicates: AtomicUsize::new(self.duplicates.load(Ordering::Relaxed)),
            failed: AtomicUsize::new(self.failed.load(Ordering::Relaxed)),
        }
    }
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a finished item
    pub fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Moved { .. } | Outcome::DryRun { .. } => &self.moved,
            Outcome::Duplicate { .. } => &self.duplicates,
            Outcome::Missing | Outcome::Unsupported => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of items attempted
    pub fn total(&self) -> usize {
        self.moved.load(Ordering::Relaxed)
            + self.skipped.load(Ordering::Relaxed)
            + self.duplicates.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> String {
        format!(
            "Total: {}, Moved: {}, Skipped: {}, Duplicates: {}, Failed: {}",
            self.total(),
            self.moved.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.duplicates.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        )
    }
}

/// Files changed paths into the date-bucketed archive
#[derive(Debug)]
pub struct Organizer {
    config: Config,
    planner: DestinationPlanner,
    cache: HashCache,
}

impl Organizer {
    /// Create an organizer using EXIF metadata for capture dates
    pub fn new(config: Config) -> Self {
        Self::with_resolver(config, CaptureDateResolver::default())
    }

    /// Create an organizer with a custom capture date resolver
    pub fn with_resolver(config: Config, resolver: CaptureDateResolver) -> Self {
        // Configure Rayon thread pool used for folder back-fill hashing
        if config.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build_global()
                .ok(); // Ignore if already initialized
        }

        Self {
            config,
            planner: DestinationPlanner::new(resolver),
            cache: HashCache::new(),
        }
    }

    /// Decide what to do with `path` and do it
    pub fn process(&mut self, path: &Path) -> Result<Outcome> {
        let _span = span!(Level::DEBUG, "process_file", ?path).entered();

        if !path.is_file() {
            debug!(?path, "Path no longer exists, skipping");
            return Ok(Outcome::Missing);
        }

        if !self.config.is_supported_path(path) {
            debug!(?path, "Unsupported extension, skipping");
            return Ok(Outcome::Unsupported);
        }

        match self.organize(path) {
            // Moved or deleted by someone else while it was being processed
            Err(e) if !path.exists() => {
                debug!(?path, error = %e, "Path vanished during processing, skipping");
                Ok(Outcome::Missing)
            }
            result => result,
        }
    }

    /// Plan, dedup and move an existing, supported file
    fn organize(&mut self, path: &Path) -> Result<Outcome> {
        let (time, planned) = self.planner.plan(&self.config.destination_dir, path)?;

        if let Some(existing) = self.cache.find_duplicate(&planned.folder, path)? {
            info!(
                source = ?path,
                ?existing,
                "Identical file already archived, leaving source in place"
            );
            return Ok(Outcome::Duplicate { existing });
        }

        let renamed = planned.is_renamed(&time.date, path);

        if self.config.dry_run {
            info!(
                source = ?path,
                destination = ?planned.path,
                time_source = ?time.source,
                "Would move file"
            );
            return Ok(Outcome::DryRun {
                destination: planned.path,
            });
        }

        fsops::ensure_dir(&planned.folder)?;
        let method = fsops::move_file(path, &planned.path)?;

        info!(
            source = ?path,
            destination = ?planned.path,
            time_source = ?time.source,
            capture_date = %time.date,
            renamed,
            ?method,
            "Moved file"
        );

        Ok(Outcome::Moved {
            destination: planned.path,
            renamed,
            method,
        })
    }
}
