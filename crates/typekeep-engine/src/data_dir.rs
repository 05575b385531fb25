// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution — where config, backups and the audit database
// live when the caller does not say otherwise.

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable that overrides the data directory outright.
pub const DATA_DIR_ENV: &str = "TYPEKEEP_DATA_DIR";

/// The data directory for this process environment. Not created here.
pub fn data_dir() -> PathBuf {
    resolve(|key| std::env::var_os(key))
}

/// `$TYPEKEEP_DATA_DIR`, else `typekeep` under the XDG data home, else the
/// system temp directory.
fn resolve(var: impl Fn(&str) -> Option<OsString>) -> PathBuf {
    let non_empty = |key: &str| var(key).filter(|value| !value.is_empty());
    if let Some(dir) = non_empty(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let base = non_empty("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("typekeep")
}
