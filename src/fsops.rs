//! Directory creation and file move primitives

use crate::error::{Error, Result};
use crate::hash::compute_file_hash;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// How a file reached its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveMethod {
    /// Same-filesystem rename
    Rename,
    /// Verified copy followed by deletion of the source
    CopyAndDelete,
}

/// Create `dir` and all of its parents; an existing directory is success
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    match fs::create_dir_all(dir) {
        Ok(()) => {
            info!(folder = ?dir, "Created folder");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(Error::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}

/// Move `source` to `dest`
///
/// A plain rename is tried first. When source and destination are on
/// different filesystems the file is copied, its content is checked
/// against the source, and only then is the source removed.
pub fn move_file(source: &Path, dest: &Path) -> Result<MoveMethod> {
    move_file_with(source, dest, |from, to| fs::rename(from, to))
}

fn move_file_with(
    source: &Path,
    dest: &Path,
    rename: impl FnOnce(&Path, &Path) -> io::Result<()>,
) -> Result<MoveMethod> {
    match rename(source, dest) {
        Ok(()) => Ok(MoveMethod::Rename),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(?source, ?dest, "Rename crosses filesystems, copying instead");
            copy_verified(source, dest)?;
            fs::remove_file(source).map_err(|e| Error::Move {
                from: source.to_path_buf(),
                to: dest.to_path_buf(),
                source: e,
            })?;
            Ok(MoveMethod::CopyAndDelete)
        }
        Err(e) => Err(Error::Move {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            source: e,
        }),
    }
}

/// Copy `source` to `dest`, keep its mtime, and check the copy's content
///
/// An existing `dest` is never overwritten. If the copy fails part way or
/// does not match the source, the copy is removed again.
pub fn copy_verified(source: &Path, dest: &Path) -> Result<()> {
    copy_verified_with(source, dest, copy_file)
}

fn copy_verified_with(
    source: &Path,
    dest: &Path,
    copy: impl FnOnce(&Path, &Path) -> Result<()>,
) -> Result<()> {
    copy(source, dest)?;

    let verified = match (compute_file_hash(source), compute_file_hash(dest)) {
        (Ok(expected), Ok(actual)) if expected == actual => Ok(()),
        (Err(e), _) | (_, Err(e)) => Err(e),
        _ => Err(Error::CopyVerification {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
        }),
    };

    if verified.is_err() {
        remove_partial(dest);
    }
    verified
}

/// Copy file with buffered I/O, preserving the modification time
fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let to_move_error = |e: io::Error| Error::Move {
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        source: e,
    };

    let src_file = File::open(source).map_err(to_move_error)?;
    let dest_file = File::options()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(to_move_error)?;

    let write_all = || -> io::Result<()> {
        let mut reader = BufReader::with_capacity(256 * 1024, src_file);
        let mut writer = BufWriter::with_capacity(256 * 1024, dest_file);

        let mut buffer = vec![0u8; 256 * 1024];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            writer.write_all(&buffer[..bytes_read])?;
        }
        writer.flush()
    };

    if let Err(e) = write_all() {
        remove_partial(dest);
        return Err(to_move_error(e));
    }

    if let Ok(metadata) = fs::metadata(source)
        && let Ok(mtime) = metadata.modified()
    {
        let _ = filetime::set_file_mtime(dest, filetime::FileTime::from_system_time(mtime));
    }

    Ok(())
}

fn remove_partial(dest: &Path) {
    if let Err(e) = fs::remove_file(dest)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(?dest, error = %e, "Failed to remove partial copy");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_dir_creates_parents() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("2004").join("2004-05");

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // Already existing is fine
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dir_over_file_fails() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("2004");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = ensure_dir(&blocker.join("2004-05")).unwrap_err();
        assert!(matches!(err, Error::CreateDir { .. }));
    }

    #[test]
    fn test_move_file_renames() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("out.jpg");
        fs::write(&source, b"pixels").unwrap();

        assert_eq!(move_file(&source, &dest).unwrap(), MoveMethod::Rename);
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
    }

    #[test]
    fn test_move_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let err = move_file(&dir.path().join("gone.jpg"), &dir.path().join("out.jpg")).unwrap_err();
        assert!(matches!(err, Error::Move { .. }));
    }

    #[test]
    fn test_copy_verified_preserves_mtime() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("copy.jpg");
        fs::write(&source, b"pixels").unwrap();
        let mtime = FileTime::from_unix_time(1_393_188_434, 0);
        filetime::set_file_mtime(&source, mtime).unwrap();

        copy_verified(&source, &dest).unwrap();

        assert!(source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
        let copied = FileTime::from_last_modification_time(&fs::metadata(&dest).unwrap());
        assert_eq!(copied.unix_seconds(), mtime.unix_seconds());
    }

    #[test]
    fn test_cross_device_rename_falls_back_to_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("out.jpg");
        fs::write(&source, b"pixels").unwrap();

        let method = move_file_with(&source, &dest, |_, _| {
            Err(io::Error::from(io::ErrorKind::CrossesDevices))
        })
        .unwrap();

        assert_eq!(method, MoveMethod::CopyAndDelete);
        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
    }

    #[test]
    fn test_other_rename_errors_are_not_retried() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("out.jpg");
        fs::write(&source, b"pixels").unwrap();

        let err = move_file_with(&source, &dest, |_, _| {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        })
        .unwrap_err();

        assert!(matches!(err, Error::Move { .. }));
        assert!(source.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_corrupted_copy_is_removed() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("copy.jpg");
        fs::write(&source, b"pixels").unwrap();

        let err = copy_verified_with(&source, &dest, |_, to| {
            fs::write(to, b"pixelz").map_err(Error::Io)
        })
        .unwrap_err();

        assert!(matches!(err, Error::CopyVerification { .. }));
        assert!(!dest.exists());
        assert_eq!(fs::read(&source).unwrap(), b"pixels");
    }

    #[test]
    fn test_cross_device_move_keeps_source_on_bad_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("taken.jpg");
        fs::write(&source, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        // The copy refuses to overwrite, so the source must survive
        assert!(
            move_file_with(&source, &dest, |_, _| {
                Err(io::Error::from(io::ErrorKind::CrossesDevices))
            })
            .is_err()
        );
        assert!(source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn test_copy_verified_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("in.jpg");
        let dest = dir.path().join("taken.jpg");
        fs::write(&source, b"new").unwrap();
        fs::write(&dest, b"old").unwrap();

        assert!(copy_verified(&source, &dest).is_err());
        assert_eq!(fs::read(&dest).unwrap(), b"old");
        assert!(source.exists());
    }
}
