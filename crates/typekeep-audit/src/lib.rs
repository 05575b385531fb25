// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// typekeep-audit — Audit trail, fingerprints and backups for Typekeep.
//
// Every edit snapshots its input before anything changes and records one
// append-only audit entry when it finishes, so any edit can be traced back
// to the exact bytes it started from.

pub mod audit;
pub mod backup;
pub mod integrity;

// Re-export the primary types so callers can use `typekeep_audit::AuditLog` etc.
pub use audit::AuditLog;
pub use backup::{BackupGuard, BackupManager, is_retained};
pub use integrity::{hash_bytes, same_fingerprint, verify_hash};
