use std::ffi::OsString;
use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::error::LabelError;

const BACKUP_SUFFIX: &str = "~";

/// `photo.jpg` → `photo.jpg~`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copy `path` to its backup before it gets rewritten.
///
/// Fails with [`LabelError::BackupConflict`] when a backup already exists; an
/// existing backup is never touched. The copy is flushed to disk and carries
/// the original permissions and timestamps. Backups are never removed here:
/// restoring or discarding them is up to the operator.
pub fn protect(path: &Path) -> Result<PathBuf, LabelError> {
    let backup = backup_path(path);

    let mut source = File::open(path).map_err(LabelError::io(path))?;
    let metadata = source.metadata().map_err(LabelError::io(path))?;

    let mut target = match OpenOptions::new().write(true).create_new(true).open(&backup) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(LabelError::BackupConflict { path: backup });
        }
        Err(e) => return Err(LabelError::io(&backup)(e)),
    };

    let copied = io::copy(&mut source, &mut target)
        .and_then(|_| target.set_permissions(metadata.permissions()))
        .and_then(|_| target.sync_all());
    if let Err(e) = copied {
        drop(target);
        // The half-written file is ours; leaving it would block every later run.
        if let Err(cleanup) = fs::remove_file(&backup) {
            log::warn!("Failed to remove partial backup {}: {cleanup}", backup.display());
        }
        return Err(LabelError::io(&backup)(e));
    }

    if let Err(e) = copy_times(&metadata, &target) {
        log::debug!("Could not copy timestamps to {}: {e}", backup.display());
    }

    log::debug!("Backup created: {}", backup.display());
    Ok(backup)
}

fn copy_times(metadata: &fs::Metadata, target: &File) -> io::Result<()> {
    let times = FileTimes::new()
        .set_accessed(metadata.accessed()?)
        .set_modified(metadata.modified()?);
    target.set_times(times)
}
