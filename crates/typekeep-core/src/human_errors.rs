// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for audit notes and the command line.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The severity drives whether a caller should retry, change the request, or
// give up on the document.

use crate::error::TypekeepError;

/// Severity of an error from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Disk or database hiccup; retrying the same request may work.
    Transient,
    /// The request needs changing (different selector, font, engine).
    ActionRequired,
    /// The document itself cannot be edited this way.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Whether retrying unchanged could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    /// Single-line form used in audit notes.
    pub fn as_note(&self) -> String {
        format!("{} {}", self.message, self.suggestion)
    }
}

/// Convert a `TypekeepError` into a `HumanError`.
pub fn humanize_error(err: &TypekeepError) -> HumanError {
    match err {
        // -- Edit taxonomy --
        TypekeepError::NotFound { selector } => HumanError {
            message: "No matching text was found.".into(),
            suggestion: format!(
                "Check the search text and page number ({selector}). Text inside form XObjects cannot be edited."
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        TypekeepError::GeometryConflict { reason, .. } => HumanError {
            message: "This text cannot be separated from what is drawn around it.".into(),
            suggestion: format!(
                "The page draws the text in a way that can't be safely removed ({reason}). Try selecting a different run."
            ),
            retriable: false,
            severity: Severity::Permanent,
        },

        TypekeepError::UnsupportedFont { font, reason, .. } => HumanError {
            message: format!("The font {font} can't draw the new text."),
            suggestion: if reason.contains("not embedded") {
                "The font isn't stored in the PDF. Allow the direct engine, or choose a font the page already uses.".into()
            } else {
                format!(
                    "Some characters aren't available in the original font ({reason}). Try removing accented or special characters."
                )
            },
            retriable: false,
            severity: Severity::ActionRequired,
        },

        TypekeepError::DriftUnrecoverable { expected, .. } => HumanError {
            message: format!("The new text couldn't be drawn in {expected}."),
            suggestion: "Neither engine could keep the original font. The run was left unchanged; try different wording or accept a standard font with force-direct.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        TypekeepError::Validation { reason, .. } => HumanError {
            message: "The edit request isn't valid.".into(),
            suggestion: format!("Fix the request and try again: {reason}."),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Document errors --
        TypekeepError::PdfError(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged or encrypted. Try opening it in a viewer first to check it works.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        TypekeepError::Render(detail) => HumanError {
            message: "The new text couldn't be written into the page.".into(),
            suggestion: format!("The page content could not be rewritten ({detail})."),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Storage --
        TypekeepError::Backup(_) => HumanError {
            message: "A safety copy of the document couldn't be saved.".into(),
            suggestion: "Check there is free disk space and that the backup folder is writable. Nothing was changed.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        TypekeepError::IntegrityMismatch { .. } => HumanError {
            message: "The safety copy doesn't match the document it was taken from.".into(),
            suggestion: "The backup file was changed after it was written. Restore from another copy.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        TypekeepError::Database(_) => HumanError {
            message: "The edit history couldn't be updated.".into(),
            suggestion: "Check the audit database isn't open in another program, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        TypekeepError::Io(io_err) => HumanError {
            message: "A file couldn't be read or written.".into(),
            suggestion: format!("Check the path and permissions. ({io_err})"),
            retriable: true,
            severity: Severity::Transient,
        },

        TypekeepError::Serialization(_) => HumanError {
            message: "Stored data couldn't be read.".into(),
            suggestion: "The request or audit record is malformed. Re-create it rather than editing it by hand.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}
