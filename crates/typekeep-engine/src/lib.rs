// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// typekeep-engine — the font-fidelity text-edit engine.
//
// Ties the document crate (locate, redact, render, check) to the audit crate
// (snapshots and the append-only log) behind a single `EngineManager`.

pub mod cancel;
pub mod data_dir;
pub mod manager;

pub use cancel::CancelToken;
pub use manager::{EditReport, EngineManager};
