// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typekeep — Core types and error definitions shared across all crates.

pub mod config;
pub mod dom;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::{BackupRetention, EngineConfig};
pub use dom::*;
pub use error::{FailureKind, Result, RunFailure, TypekeepError};
pub use types::*;
