//! EXIF time extraction for images

use super::{CaptureDate, MetadataExtractor};
use crate::error::{Error, Result};
use exif::{In, Reader, Tag, Value};
use regex::Regex;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Separators between the components of an EXIF timestamp
static TIMESTAMP_SEPARATOR: OnceLock<Regex> = OnceLock::new();

fn timestamp_separator() -> &'static Regex {
    TIMESTAMP_SEPARATOR.get_or_init(|| Regex::new(r"[: ]").unwrap())
}

/// Raw timestamp strings read from a file's EXIF block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTimestamps {
    /// `DateTimeOriginal`: when the picture was taken
    pub original: Option<String>,
    /// `DateTimeDigitized`: when the picture was digitized
    pub digitized: Option<String>,
}

impl MetadataTimestamps {
    /// Highest-priority timestamp present
    pub fn preferred(&self) -> Option<&str> {
        self.original.as_deref().or(self.digitized.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_none() && self.digitized.is_none()
    }
}

/// Outcome of parsing a raw EXIF timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    Valid(CaptureDate),
    /// Wrong component count, non-numeric component or impossible date
    Malformed,
}

/// Reads `DateTimeOriginal` / `DateTimeDigitized` with kamadak-exif
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifExtractor;

impl MetadataExtractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Option<MetadataTimestamps> {
        match read_exif_timestamps(path) {
            Ok(timestamps) if !timestamps.is_empty() => Some(timestamps),
            Ok(_) => {
                debug!(?path, "No EXIF date tag found");
                None
            }
            Err(e) => {
                debug!(?path, error = %e, "No EXIF data");
                None
            }
        }
    }
}

/// Read the raw capture timestamps from a file's EXIF block
pub fn read_exif_timestamps(path: &Path) -> Result<MetadataTimestamps> {
    let file = File::open(path).map_err(|e| Error::io_at(path, e))?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExifRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let ascii_field = |tag: Tag| {
        let field = exif.get_field(tag, In::PRIMARY)?;
        match field.value {
            Value::Ascii(ref values) => values.first().map(|v| {
                trace!(?path, ?tag, "Found EXIF date");
                String::from_utf8_lossy(v).into_owned()
            }),
            _ => None,
        }
    };

    Ok(MetadataTimestamps {
        original: ascii_field(Tag::DateTimeOriginal),
        digitized: ascii_field(Tag::DateTimeDigitized),
    })
}

/// Parse an EXIF timestamp of the form "YYYY:MM:DD HH:MM:SS"
///
/// The string must split into exactly six integer components.
pub fn parse_exif_timestamp(raw: &str) -> ParsedTimestamp {
    let raw = raw.trim().trim_matches(|c: char| c == '"' || c == '\0');

    let components: Option<Vec<i64>> = timestamp_separator()
        .split(raw)
        .map(|part| part.parse::<i64>().ok())
        .collect();

    let Some(components) = components else {
        return ParsedTimestamp::Malformed;
    };
    let [year, month, day, hour, minute, second] = components[..] else {
        return ParsedTimestamp::Malformed;
    };

    let in_range = |v: i64| u32::try_from(v).ok();
    let date = i32::try_from(year).ok().and_then(|year| {
        CaptureDate::from_ymd_hms(
            year,
            in_range(month)?,
            in_range(day)?,
            in_range(hour)?,
            in_range(minute)?,
            in_range(second)?,
        )
    });

    match date {
        Some(date) => ParsedTimestamp::Valid(date),
        None => ParsedTimestamp::Malformed,
    }
}
