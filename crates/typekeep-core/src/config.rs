// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// When a pre-edit snapshot is kept after the audit entry is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupRetention {
    /// Keep every snapshot.
    #[default]
    Always,
    /// Keep the snapshot only if at least one run was applied.
    OnChange,
}

/// Persistent engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding `<operation_id>.pdf` snapshots. Relative paths are
    /// resolved against the data directory.
    pub backup_dir: PathBuf,
    /// SQLite audit database. Relative paths are resolved against the data
    /// directory.
    pub audit_db: PathBuf,
    pub backup_retention: BackupRetention,
    /// Maximum ratio of padded replacement width to original width.
    pub padding_tolerance: f32,
    /// Fraction of a run's box that another identical run must cover to be
    /// treated as an overprint.
    pub overprint_threshold: f32,
    /// Rounding step (points) applied to run origins when deriving ids.
    pub position_precision: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("backups"),
            audit_db: PathBuf::from("audit.db"),
            backup_retention: BackupRetention::Always,
            padding_tolerance: 1.2,
            overprint_threshold: 0.5,
            position_precision: 0.1,
        }
    }
}

const CONFIG_FILE: &str = "config.json";

impl EngineConfig {
    /// Load `config.json` from `dir`, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default()
    }

    /// Write `config.json` into `dir`.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE), json)?;
        Ok(())
    }

    /// Anchor relative paths at `base`.
    pub fn resolved(mut self, base: &Path) -> Self {
        if self.backup_dir.is_relative() {
            self.backup_dir = base.join(&self.backup_dir);
        }
        if self.audit_db.is_relative() {
            self.audit_db = base.join(&self.audit_db);
        }
        self
    }
}
