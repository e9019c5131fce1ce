//! CLI argument parsing with clap

use crate::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Media Sorter - watch a folder and file new photos by capture date
///
/// Every supported image that appears under SOURCE_FOLDER is moved to
/// DESTINATION_FOLDER/YYYY/YYYY-MM/YYYY-MM-DD HH.MM.SS.ext, using the EXIF
/// capture time when present and the file modification time otherwise.
/// Files whose content already exists in the target folder are left alone.
/// Runs until interrupted; queued files are finished before exiting.
#[derive(Parser, Debug)]
#[command(name = "media-sorter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Folder to watch for incoming media
    #[arg(required_unless_present = "print_config")]
    pub source_folder: Option<PathBuf>,

    /// Archive root receiving the date-bucketed files
    #[arg(required_unless_present = "print_config")]
    pub destination_folder: Option<PathBuf>,

    /// Path to configuration file (TOML format)
    ///
    /// When specified, settings from the config file are used as defaults.
    /// CLI arguments will override config file settings.
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// File media already present in the source folder at startup
    #[arg(long)]
    pub scan_on_start: bool,

    /// Maximum number of queued notifications (default: unbounded)
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Number of threads for hashing folder contents (0 = auto)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Dry run mode - log planned moves without touching the filesystem
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write daily-rotated log files into this directory
    #[arg(long, env = "MEDIA_SORTER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Output log format as JSON
    #[arg(long)]
    pub json_log: bool,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Get config file name (without extension) for log naming
    pub fn config_name(&self) -> Option<String> {
        self.config.as_ref().and_then(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    /// Merge CLI arguments with config from file
    /// CLI arguments take precedence over config file settings
    pub fn merge_with_config(&self, mut config: Config) -> Config {
        if let Some(ref source) = self.source_folder {
            config.source_dir = source.clone();
        }
        if let Some(ref destination) = self.destination_folder {
            config.destination_dir = destination.clone();
        }
        if self.scan_on_start {
            config.scan_on_start = true;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = Some(capacity);
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.verbose {
            config.verbose = true;
        }

        config
    }

    /// Convert CLI arguments to Config (when no config file is used)
    pub fn to_config(&self) -> Config {
        self.merge_with_config(Config::default())
    }
}
