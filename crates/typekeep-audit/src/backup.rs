// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backup snapshots — verbatim copies of each input document, written before
// any edit starts and never overwritten.
//
// A snapshot is held by a `BackupGuard` until the audit entry for the edit
// has been recorded; only then is it released, which keeps or discards the
// file according to the retention policy.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use typekeep_core::config::BackupRetention;
use typekeep_core::error::{Result, TypekeepError};
use typekeep_core::types::OperationId;

use crate::integrity::{hash_bytes, verify_hash};

/// Whether a snapshot survives release under `policy`.
pub fn is_retained(policy: BackupRetention, changed: bool) -> bool {
    match policy {
        BackupRetention::Always => true,
        BackupRetention::OnChange => changed,
    }
}

/// Writes and reads backup snapshots in a single directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to `<dir>/<operation_id>.pdf`.
    ///
    /// Fails with `Backup` if a file already exists at that path; an
    /// existing snapshot is never replaced.
    #[instrument(skip(self, bytes), fields(%operation_id, len = bytes.len()))]
    pub fn snapshot(&self, operation_id: &OperationId, bytes: &[u8]) -> Result<BackupGuard> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{operation_id}.pdf"));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => TypekeepError::Backup(format!(
                    "refusing to overwrite existing snapshot {}",
                    path.display()
                )),
                _ => TypekeepError::Backup(format!("cannot create {}: {e}", path.display())),
            })?;
        file.write_all(bytes)?;
        file.sync_all()?;

        debug!(path = %path.display(), "snapshot written");
        Ok(BackupGuard {
            path,
            hash: hash_bytes(bytes),
            released: false,
        })
    }

    /// Read a snapshot back, optionally checking it against its fingerprint.
    #[instrument(skip(self, expected_hash), fields(location = %location.as_ref().display()))]
    pub fn restore(&self, location: impl AsRef<Path>, expected_hash: Option<&str>) -> Result<Vec<u8>> {
        let location = location.as_ref();
        let bytes = fs::read(location).map_err(|e| {
            TypekeepError::Backup(format!("cannot read snapshot {}: {e}", location.display()))
        })?;
        if let Some(expected) = expected_hash {
            verify_hash(&bytes, expected)?;
        }
        debug!(len = bytes.len(), "snapshot restored");
        Ok(bytes)
    }
}

/// A snapshot awaiting release.
///
/// Dropping the guard without calling [`BackupGuard::release`] keeps the
/// file.
#[derive(Debug)]
pub struct BackupGuard {
    path: PathBuf,
    hash: String,
    released: bool,
}

impl BackupGuard {
    pub fn location(&self) -> &Path {
        &self.path
    }

    /// SHA-256 of the snapshot contents.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Keep or discard the snapshot. Returns its location when kept.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn release(mut self, policy: BackupRetention, changed: bool) -> Result<Option<PathBuf>> {
        self.released = true;
        if is_retained(policy, changed) {
            debug!("snapshot retained");
            return Ok(Some(self.path.clone()));
        }
        fs::remove_file(&self.path)?;
        debug!("snapshot discarded");
        Ok(None)
    }
}

impl Drop for BackupGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(path = %self.path.display(), "backup guard dropped without release; snapshot kept");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, BackupManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("backups"));
        (dir, manager)
    }

    #[test]
    fn snapshot_and_restore() {
        let (_dir, manager) = manager();
        let id = OperationId::new();
        let guard = manager.snapshot(&id, b"%PDF-1.7 original").unwrap();
        assert!(guard.location().ends_with(format!("{id}.pdf")));
        assert_eq!(guard.hash(), hash_bytes(b"%PDF-1.7 original"));

        let location = guard.release(BackupRetention::Always, false).unwrap().unwrap();
        let hash = hash_bytes(b"%PDF-1.7 original");
        let bytes = manager.restore(&location, Some(&hash)).unwrap();
        assert_eq!(bytes, b"%PDF-1.7 original");
    }

    #[test]
    fn existing_snapshot_is_never_overwritten() {
        let (_dir, manager) = manager();
        let id = OperationId::new();
        let first = manager.snapshot(&id, b"first").unwrap();
        let err = manager.snapshot(&id, b"second").unwrap_err();
        assert!(matches!(err, TypekeepError::Backup(_)));

        let location = first.release(BackupRetention::Always, true).unwrap().unwrap();
        assert_eq!(fs::read(location).unwrap(), b"first");
    }

    #[test]
    fn on_change_discards_untouched_snapshots() {
        let (_dir, manager) = manager();
        let kept = manager.snapshot(&OperationId::new(), b"a").unwrap();
        let kept_path = kept.location().to_path_buf();
        assert!(kept.release(BackupRetention::OnChange, true).unwrap().is_some());
        assert!(kept_path.exists());

        let dropped = manager.snapshot(&OperationId::new(), b"b").unwrap();
        let dropped_path = dropped.location().to_path_buf();
        assert!(dropped.release(BackupRetention::OnChange, false).unwrap().is_none());
        assert!(!dropped_path.exists());
    }

    #[test]
    fn unreleased_guard_keeps_the_file() {
        let (_dir, manager) = manager();
        let guard = manager.snapshot(&OperationId::new(), b"keep me").unwrap();
        let path = guard.location().to_path_buf();
        drop(guard);
        assert!(path.exists());
    }

    #[test]
    fn restore_detects_tampering() {
        let (_dir, manager) = manager();
        let guard = manager.snapshot(&OperationId::new(), b"original").unwrap();
        let hash = guard.hash().to_string();
        let location = guard.release(BackupRetention::Always, true).unwrap().unwrap();
        fs::write(&location, b"tampered").unwrap();

        let err = manager.restore(&location, Some(&hash)).unwrap_err();
        assert!(matches!(err, TypekeepError::IntegrityMismatch { .. }));
    }
}
