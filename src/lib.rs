//! Media Sorter - a daemon that files new photos by capture date
//!
//! This library provides the pieces of the sorter:
//! - EXIF capture date extraction with modification-time fallback
//! - Deterministic `YYYY/YYYY-MM/YYYY-MM-DD HH.MM.SS[-n].ext` destinations
//! - SHA-256 based per-folder duplicate detection
//! - A single-worker pipeline fed by a recursive filesystem watcher

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod fsops;
pub mod hash;
pub mod os;
pub mod pipeline;
pub mod planner;
pub mod scan;
pub mod time;
pub mod watcher;

pub use cache::HashCache;
pub use cli::Cli;
pub use config::{Config, ConfigError};
pub use engine::{Organizer, Outcome, ProcessingStats};
pub use error::{Error, Result};
pub use pipeline::{ItemProcessor, Pipeline, PipelineHandle};
pub use planner::{DestinationPlanner, PlannedDestination};
pub use time::{CaptureDate, CaptureDateResolver, ExtractedTime, TimeSource};
pub use watcher::SourceWatcher;
