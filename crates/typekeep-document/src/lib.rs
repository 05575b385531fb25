// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// typekeep-document — PDF text-run editing for Typekeep.
//
// Locates text runs in page content streams, blanks them in place, and draws
// replacement text either with a standard font (direct) or with the page's
// own embedded font (preserving), then reads the result back to check which
// font was really used. Also grades how faithfully each font can be redrawn.

pub mod backend;
pub mod fidelity;
pub mod locator;
pub mod pdf;
pub mod redactor;
pub mod requirements;

#[cfg(test)]
mod testing;

// Re-export the primary types so callers can use `typekeep_document::Locator` etc.
pub use backend::{DirectBackend, PreservingBackend, RenderResult};
pub use fidelity::{FidelityCheck, check};
pub use locator::{LocatedRun, Locator, PageScan};
pub use pdf::PdfDocument;
pub use redactor::Redactor;
pub use requirements::{font_report, run_quality};
