// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — document handle, content interpretation, fonts and encodings.

pub mod content;
pub mod document;
pub mod encoding;
pub mod fonts;
pub mod metrics;
pub mod objects;

pub use document::PdfDocument;
pub use fonts::{FontInfo, PageFonts};
