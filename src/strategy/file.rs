// SPDX-License-Identifier: PMPL-1.0-or-later

//! Safe file deletion: resolve, re-check policy, back up, verify, remove.

use super::Strategy;
use crate::error::TargetError;
use crate::policy::{has_traversal, Policy};
use crate::types::{DestructionCategory, Metrics};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix appended to the original path to form the backup path.
pub const BACKUP_SUFFIX: &str = ".burndevice.backup";

/// Backup slots tried per file: `<path>.burndevice.backup`, then `.1`, `.2`, ...
pub const MAX_BACKUP_SLOTS: usize = 64;

pub struct FileDeletion {
    policy: Arc<Policy>,
    remove: fn(&Path) -> io::Result<()>,
}

impl FileDeletion {
    pub fn new(policy: Arc<Policy>) -> Self {
        Self {
            policy,
            remove: remove_file,
        }
    }

    /// Policy check against the path the filesystem actually resolves to.
    fn check_resolved(&self, path: &Path) -> Result<(), TargetError> {
        let display = path.to_string_lossy();
        if self.policy.is_blocked(&display) {
            return Err(TargetError::ResolvedBlocked(path.to_path_buf()));
        }
        if !self.policy.is_allowed(&display) {
            return Err(TargetError::ResolvedNotAllowed(path.to_path_buf()));
        }
        Ok(())
    }

    /// Create a fresh backup file next to `original`.
    ///
    /// Slots are opened with `create_new`, so an existing entry of any kind
    /// (an earlier backup, a directory, a symlink planted at the slot) is
    /// never followed or overwritten; the next slot is tried instead.
    fn create_backup(&self, original: &Path) -> Result<(PathBuf, File), TargetError> {
        for slot in 0..MAX_BACKUP_SLOTS {
            let candidate = backup_slot(original, slot);
            self.check_resolved(&candidate)?;
            match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(file) => return Ok((candidate, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(TargetError::Backup(err)),
            }
        }
        Err(TargetError::Backup(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("all {} backup slots are taken", MAX_BACKUP_SLOTS),
        )))
    }
}

impl Strategy for FileDeletion {
    fn category(&self) -> DestructionCategory {
        DestructionCategory::FileDeletion
    }

    fn run_target(&self, target: &str) -> Result<Metrics, TargetError> {
        if self.policy.is_blocked(target) {
            return Err(TargetError::Blocked);
        }
        if has_traversal(target) {
            return Err(TargetError::PathTraversal(target.to_string()));
        }

        // Symlinks are followed: the file that disappears is the one the
        // policy approved after resolution.
        let resolved = fs::canonicalize(target).map_err(TargetError::Stat)?;
        self.check_resolved(&resolved)?;

        let metadata = fs::metadata(&resolved).map_err(TargetError::Stat)?;
        if metadata.is_dir() {
            return Err(TargetError::IsDirectory);
        }

        let (backup, file) = self.create_backup(&resolved)?;
        if let Err(err) = copy_verified(&resolved, file) {
            // Only the half-written slot we created goes; the original stays.
            if let Err(cleanup) = fs::remove_file(&backup) {
                tracing::warn!(backup = %backup.display(), error = %cleanup, "failed to discard partial backup");
            }
            return Err(err);
        }

        // Backup stays in place even if removal fails below.
        (self.remove)(&resolved).map_err(TargetError::Remove)?;

        tracing::info!(
            target_path = %resolved.display(),
            backup = %backup.display(),
            bytes = metadata.len(),
            "safe deletion completed"
        );

        Ok(Metrics {
            files_deleted: 1,
            bytes_destroyed: metadata.len(),
            ..Metrics::default()
        })
    }
}

fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// First-choice backup location for `original`.
pub fn backup_path(original: &Path) -> PathBuf {
    backup_slot(original, 0)
}

fn backup_slot(original: &Path, slot: usize) -> PathBuf {
    let mut name: OsString = original.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    if slot > 0 {
        name.push(format!(".{}", slot));
    }
    PathBuf::from(name)
}

/// Copy `src` into the freshly created `dst` handle and confirm both hash
/// identically. The copy is re-read through the same handle, never by path.
fn copy_verified(src: &Path, mut dst: File) -> Result<(), TargetError> {
    let mut source = File::open(src).map_err(TargetError::Backup)?;
    io::copy(&mut source, &mut dst).map_err(TargetError::Backup)?;
    dst.flush().map_err(TargetError::Backup)?;
    dst.sync_all().map_err(TargetError::Backup)?;

    let original = hash_reader(File::open(src).map_err(TargetError::Backup)?)
        .map_err(TargetError::Backup)?;
    dst.seek(SeekFrom::Start(0)).map_err(TargetError::Backup)?;
    let copy = hash_reader(&mut dst).map_err(TargetError::Backup)?;
    if original != copy {
        return Err(TargetError::BackupMismatch(src.to_path_buf()));
    }
    Ok(())
}

fn hash_reader(reader: impl io::Read) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_reader(reader)?;
    Ok(hasher.finalize())
}
