//! Capture date resolution
//!
//! The capture date of a media file is taken from its embedded EXIF
//! timestamps when one is present and well formed, and from the file
//! system modification time (in local time) otherwise.

pub mod exif;

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

pub use self::exif::{ExifExtractor, MetadataTimestamps, ParsedTimestamp, parse_exif_timestamp};

/// Timestamp at which a media file was recorded, with whole-second precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureDate(NaiveDateTime);

impl CaptureDate {
    /// Build a capture date from its six components
    pub fn from_ymd_hms(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<Self> {
        chrono::NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn second(&self) -> u32 {
        self.0.second()
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl From<NaiveDateTime> for CaptureDate {
    fn from(value: NaiveDateTime) -> Self {
        // Sub-second precision is dropped
        Self(value.with_nanosecond(0).unwrap_or(value))
    }
}

impl fmt::Display for CaptureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Source of the resolved capture date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// Extracted from EXIF metadata
    Exif,
    /// From file system modification time
    FileSystem,
}

/// Result of capture date resolution
#[derive(Debug, Clone, Copy)]
pub struct ExtractedTime {
    /// The resolved capture date
    pub date: CaptureDate,
    /// Source of the capture date
    pub source: TimeSource,
}

/// Reads embedded capture timestamps from a file
pub trait MetadataExtractor: Send {
    /// Return the raw timestamp strings found in the file, if any
    fn extract(&self, path: &Path) -> Option<MetadataTimestamps>;
}

/// Resolves the best-known capture date of a file
pub struct CaptureDateResolver {
    extractor: Box<dyn MetadataExtractor>,
}

impl Default for CaptureDateResolver {
    fn default() -> Self {
        Self::new(Box::new(ExifExtractor))
    }
}

impl fmt::Debug for CaptureDateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureDateResolver").finish_non_exhaustive()
    }
}

impl CaptureDateResolver {
    pub fn new(extractor: Box<dyn MetadataExtractor>) -> Self {
        Self { extractor }
    }

    /// Resolve the capture date of `path`
    ///
    /// Missing or malformed metadata never fails this call; it falls back
    /// to the modification time. Only a failure to stat the file itself is
    /// returned as an error.
    pub fn resolve(&self, path: &Path) -> Result<ExtractedTime> {
        if let Some(date) = self.metadata_date(path) {
            debug!(?path, %date, "Extracted time from EXIF");
            return Ok(ExtractedTime {
                date,
                source: TimeSource::Exif,
            });
        }

        let date = modification_date(path)?;
        debug!(?path, %date, "Using file system modification time");
        Ok(ExtractedTime {
            date,
            source: TimeSource::FileSystem,
        })
    }

    /// Capture date from embedded metadata
    ///
    /// Only the highest-priority field present is considered; if it is
    /// malformed the lower-priority one is not consulted.
    fn metadata_date(&self, path: &Path) -> Option<CaptureDate> {
        let timestamps = self.extractor.extract(path)?;
        let raw = timestamps.preferred()?;

        match parse_exif_timestamp(raw) {
            ParsedTimestamp::Valid(date) => Some(date),
            ParsedTimestamp::Malformed => {
                warn!(?path, timestamp = raw, "Malformed EXIF timestamp, ignoring");
                None
            }
        }
    }
}

/// Modification time of a file, converted to local time
pub fn modification_date(path: &Path) -> Result<CaptureDate> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::io_at(path, e))?;
    let local: DateTime<Local> = modified.into();
    Ok(CaptureDate::from(local.naive_local()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct FixedTimestamps(Option<MetadataTimestamps>);

    impl MetadataExtractor for FixedTimestamps {
        fn extract(&self, _path: &Path) -> Option<MetadataTimestamps> {
            self.0.clone()
        }
    }

    fn file_with_mtime(date: CaptureDate) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not really a photo").unwrap();
        file.flush().unwrap();

        let local = date.as_naive().and_local_timezone(Local).single().unwrap();
        filetime::set_file_mtime(file.path(), FileTime::from_unix_time(local.timestamp(), 0))
            .unwrap();
        file
    }

    #[test]
    fn test_capture_date_truncates_subseconds() {
        let naive = chrono::NaiveDate::from_ymd_opt(2004, 5, 7)
            .unwrap()
            .and_hms_milli_opt(20, 16, 31, 750)
            .unwrap();
        let date = CaptureDate::from(naive);
        assert_eq!(date, CaptureDate::from_ymd_hms(2004, 5, 7, 20, 16, 31).unwrap());
        assert_eq!(date.to_string(), "2004-05-07 20:16:31");
    }

    #[test]
    fn test_modification_date() {
        let expected = CaptureDate::from_ymd_hms(2014, 2, 23, 21, 47, 14).unwrap();
        let file = file_with_mtime(expected);
        assert_eq!(modification_date(file.path()).unwrap(), expected);
    }

    #[test]
    fn test_resolve_prefers_metadata() {
        let file = file_with_mtime(CaptureDate::from_ymd_hms(2014, 2, 6, 9, 15, 17).unwrap());
        let resolver = CaptureDateResolver::new(Box::new(FixedTimestamps(Some(
            MetadataTimestamps {
                original: Some("2004:05:07 20:16:31".into()),
                digitized: None,
            },
        ))));

        let time = resolver.resolve(file.path()).unwrap();
        assert_eq!(time.source, TimeSource::Exif);
        assert_eq!(time.date, CaptureDate::from_ymd_hms(2004, 5, 7, 20, 16, 31).unwrap());
    }

    #[test]
    fn test_resolve_uses_secondary_field() {
        let file = file_with_mtime(CaptureDate::from_ymd_hms(2014, 2, 6, 9, 15, 17).unwrap());
        let resolver = CaptureDateResolver::new(Box::new(FixedTimestamps(Some(
            MetadataTimestamps {
                original: None,
                digitized: Some("2006:09:09 07:00:24".into()),
            },
        ))));

        let time = resolver.resolve(file.path()).unwrap();
        assert_eq!(time.source, TimeSource::Exif);
        assert_eq!(time.date, CaptureDate::from_ymd_hms(2006, 9, 9, 7, 0, 24).unwrap());
    }

    #[test]
    fn test_resolve_malformed_falls_back_to_mtime() {
        let mtime = CaptureDate::from_ymd_hms(2014, 2, 23, 21, 47, 14).unwrap();
        let file = file_with_mtime(mtime);
        let resolver = CaptureDateResolver::new(Box::new(FixedTimestamps(Some(
            MetadataTimestamps {
                original: Some("2004:05:07".into()),
                digitized: Some("2006:09:09 07:00:24".into()),
            },
        ))));

        let time = resolver.resolve(file.path()).unwrap();
        assert_eq!(time.source, TimeSource::FileSystem);
        assert_eq!(time.date, mtime);
    }

    #[test]
    fn test_resolve_without_metadata_uses_mtime() {
        let mtime = CaptureDate::from_ymd_hms(2014, 3, 8, 18, 31, 35).unwrap();
        let file = file_with_mtime(mtime);
        let resolver = CaptureDateResolver::default();

        let time = resolver.resolve(file.path()).unwrap();
        assert_eq!(time.source, TimeSource::FileSystem);
        assert_eq!(time.date, mtime);
    }

    #[test]
    fn test_resolve_missing_file_is_error() {
        let resolver = CaptureDateResolver::new(Box::new(FixedTimestamps(None)));
        assert!(resolver.resolve(Path::new("/no/such/photo.jpg")).is_err());
    }
}
