//! Destination path planning
//!
//! Files land in `<root>/<YYYY>/<YYYY-MM>/<YYYY-MM-DD HH.MM.SS>[-<n>]<.ext>`,
//! where `<ext>` is the original extension lower-cased and `-<n>` is the
//! smallest free collision counter starting at 1.

use crate::error::Result;
use crate::time::{CaptureDate, CaptureDateResolver, ExtractedTime};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a source file should be moved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDestination {
    /// The `<root>/YYYY/YYYY-MM` folder
    pub folder: PathBuf,
    /// Collision-free path inside `folder`
    pub path: PathBuf,
}

impl PlannedDestination {
    /// Whether a collision suffix had to be added
    pub fn is_renamed(&self, date: &CaptureDate, source: &Path) -> bool {
        let canonical = file_name_for(date, source);
        self.path.file_name() != Some(OsStr::new(&canonical))
    }
}

/// Folder for a capture date, relative to the archive root: `YYYY/YYYY-MM`
pub fn folder_for(date: &CaptureDate) -> PathBuf {
    let year = format!("{:04}", date.year());
    let mut folder = PathBuf::from(&year);
    folder.push(format!("{}-{:02}", year, date.month()));
    folder
}

/// Base filename for a capture date: `YYYY-MM-DD HH.MM.SS`
pub fn base_name_for(date: &CaptureDate) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}.{:02}.{:02}",
        date.year(),
        date.month(),
        date.day(),
        date.hour(),
        date.minute(),
        date.second()
    )
}

/// Lower-cased extension of `source` including the dot, or empty
pub fn normalized_extension(source: &Path) -> String {
    source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Base filename plus the source's lower-cased extension
pub fn file_name_for(date: &CaptureDate, source: &Path) -> String {
    format!("{}{}", base_name_for(date), normalized_extension(source))
}

/// Unresolved destination path, before collision handling
pub fn path_for(root: &Path, date: &CaptureDate, source: &Path) -> PathBuf {
    root.join(folder_for(date)).join(file_name_for(date, source))
}

/// Return `<folder>/<base><ext>` if nothing exists there, else the first
/// free `<folder>/<base>-<n><ext>` counting up from 1
///
/// Existence is probed against the live filesystem; nothing is created.
pub fn resolve_collision(folder: &Path, base: &str, extension: &str) -> PathBuf {
    let unsuffixed = folder.join(format!("{}{}", base, extension));
    if !unsuffixed.exists() {
        return unsuffixed;
    }

    let mut index: u64 = 1;
    loop {
        let candidate = folder.join(format!("{}-{}{}", base, index, extension));
        if !candidate.exists() {
            debug!(original = ?unsuffixed, resolved = ?candidate, "Resolved filename collision");
            return candidate;
        }
        index += 1;
    }
}

/// Computes canonical, collision-free destinations under an archive root
#[derive(Debug, Default)]
pub struct DestinationPlanner {
    resolver: CaptureDateResolver,
}

impl DestinationPlanner {
    pub fn new(resolver: CaptureDateResolver) -> Self {
        Self { resolver }
    }

    /// Resolve the capture date of `source` and plan its destination
    pub fn plan(&self, root: &Path, source: &Path) -> Result<(ExtractedTime, PlannedDestination)> {
        let time = self.resolver.resolve(source)?;
        let planned = plan_for_date(root, &time.date, source);
        Ok((time, planned))
    }
}

/// Plan the destination of `source` for a known capture date
pub fn plan_for_date(
    root: &Path,
    date: &CaptureDate,
    source: &Path,
) -> PlannedDestination {
    let folder = root.join(folder_for(date));
    let path = resolve_collision(&folder, &base_name_for(date), &normalized_extension(source));
    PlannedDestination { folder, path }
}
