//! Configuration types for the media sorter

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for the media sorter daemon
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory tree watched for incoming media
    pub source_dir: PathBuf,

    /// Archive root that receives the date-bucketed files
    pub destination_dir: PathBuf,

    /// Directories to ignore inside the source tree (absolute paths or folder names)
    pub exclude_dirs: Vec<PathBuf>,

    /// Accepted media extensions, compared case-insensitively
    pub extensions: Vec<String>,

    /// Sweep the source tree once at startup and file what is already there
    pub scan_on_start: bool,

    /// Bound on queued notifications (None = unbounded)
    pub queue_capacity: Option<usize>,

    /// Number of threads used to hash folder contents (0 = auto)
    pub threads: usize,

    /// Dry run mode - plan and log, but don't create folders or move files
    pub dry_run: bool,

    /// Verbose output
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            destination_dir: PathBuf::new(),
            exclude_dirs: vec![],
            extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            scan_on_start: false,
            queue_capacity: None,
            threads: 0, // Auto-detect
            dry_run: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Check if a file extension is in the accepted set
    pub fn is_supported(&self, ext: &str) -> bool {
        let ext_lower = ext.to_lowercase();
        self.extensions
            .iter()
            .any(|e| e.trim_start_matches('.').to_lowercase() == ext_lower)
    }

    /// Check whether a path carries an accepted extension
    pub fn is_supported_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.is_supported(ext))
    }

    /// Check if a path lies under one of the excluded directories
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude_dirs.iter().any(|exclude| {
            if exclude.is_absolute() {
                path.starts_with(exclude)
            } else if let Some(exclude_name) = exclude.file_name() {
                path.components().any(|component| {
                    matches!(component, std::path::Component::Normal(name) if name == exclude_name)
                })
            } else {
                false
            }
        })
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Generate a sample configuration file content
    pub fn sample_config() -> String {
        r#"# Media Sorter Configuration File
# This file uses TOML format (https://toml.io)
# The source and destination folders given on the command line
# override the values below.

# Directory tree watched for incoming media
source_dir = "/home/user/Inbox"

# Archive root; files land in <destination_dir>/YYYY/YYYY-MM/
destination_dir = "/home/user/Pictures/Archive"

# Directories to ignore inside the source tree
# Can be absolute paths or folder names (will match any folder with that name)
exclude_dirs = [
    ".thumbnails",
    "@eaDir",
]

# Accepted media extensions (case-insensitive)
extensions = ["jpg", "jpeg", "png"]

# File media already sitting in the source tree when the daemon starts
scan_on_start = false

# Maximum number of queued notifications; omit for an unbounded queue
# queue_capacity = 10000

# Number of threads used to hash folder contents (0 = auto-detect)
threads = 0

# Dry run mode - log planned moves without touching the filesystem
dry_run = false

# Verbose output - show detailed processing information
verbose = false
"#
        .to_string()
    }
}

/// Errors that can occur when loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read configuration file
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse configuration file
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError { path, source } => {
                write!(f, "Failed to read config file '{}': {}", path.display(), source)
            }
            ConfigError::ParseError { path, source } => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions() {
        let config = Config::default();
        assert!(config.is_supported("png"));
        assert!(config.is_supported("jpg"));
        assert!(config.is_supported("jpeg"));
        assert!(config.is_supported("jPeg"));
        assert!(config.is_supported("PNG"));
        assert!(config.is_supported("JPG"));
        assert!(!config.is_supported("img"));
        assert!(!config.is_supported("txt"));

        assert!(config.is_supported_path(Path::new("test.JPG")));
        assert!(!config.is_supported_path(Path::new("test.txt")));
        assert!(!config.is_supported_path(Path::new("test")));
    }

    #[test]
    fn test_excluded_dirs() {
        let config = Config {
            exclude_dirs: vec![PathBuf::from(".thumbnails"), PathBuf::from("/srv/inbox/tmp")],
            ..Config::default()
        };

        assert!(config.is_excluded(Path::new("/srv/inbox/.thumbnails/a.jpg")));
        assert!(config.is_excluded(Path::new("/srv/inbox/tmp/b.jpg")));
        assert!(!config.is_excluded(Path::new("/srv/inbox/2020/c.jpg")));
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::sample_config()).unwrap();
        assert_eq!(config.extensions, vec!["jpg", "jpeg", "png"]);
        assert_eq!(config.queue_capacity, None);
        assert!(!config.scan_on_start);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sorter.toml");
        fs::write(
            &path,
            "source_dir = \"/in\"\ndestination_dir = \"/out\"\nqueue_capacity = 64\n",
        )
        .unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.source_dir, PathBuf::from("/in"));
        assert_eq!(loaded.destination_dir, PathBuf::from("/out"));
        assert_eq!(loaded.queue_capacity, Some(64));
        // Unset fields keep their defaults
        assert_eq!(loaded.extensions, vec!["jpg", "jpeg", "png"]);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "queue_capacity = \"lots\"\n").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = Config::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
