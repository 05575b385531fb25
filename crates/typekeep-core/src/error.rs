// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Typekeep.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Typekeep operations.
#[derive(Debug, Error)]
pub enum TypekeepError {
    // -- Edit taxonomy --
    #[error("no text run matched selector {selector}")]
    NotFound { selector: String },

    #[error("run {run_id} cannot be isolated for redaction: {reason}")]
    GeometryConflict { run_id: String, reason: String },

    #[error("font {font} cannot render run {run_id} without substitution: {reason}")]
    UnsupportedFont {
        run_id: String,
        font: String,
        reason: String,
    },

    #[error(
        "run {run_id} could not be rendered faithfully: expected {expected}, direct render used {}, preserving render used {} ({reason})",
        .direct_observed.as_deref().unwrap_or("nothing"),
        .preserving_observed.as_deref().unwrap_or("nothing")
    )]
    DriftUnrecoverable {
        run_id: String,
        expected: String,
        direct_observed: Option<String>,
        preserving_observed: Option<String>,
        reason: String,
    },

    #[error("invalid edit request: {reason}")]
    Validation {
        run_id: Option<String>,
        reason: String,
    },

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("render failed: {0}")]
    Render(String),

    // -- Storage / persistence --
    #[error("backup failed: {0}")]
    Backup(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TypekeepError>;

/// Error category as recorded in outcomes and audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    GeometryConflict,
    UnsupportedFont,
    DriftUnrecoverable,
    ValidationError,
    Internal,
}

/// Serializable form of a [`TypekeepError`], attached to outcomes and
/// audit entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_font: Option<String>,
}

impl TypekeepError {
    /// Shorthand for a request-level validation failure.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            run_id: None,
            reason: reason.into(),
        }
    }

    /// The taxonomy category of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::GeometryConflict { .. } => FailureKind::GeometryConflict,
            Self::UnsupportedFont { .. } => FailureKind::UnsupportedFont,
            Self::DriftUnrecoverable { .. } => FailureKind::DriftUnrecoverable,
            Self::Validation { .. } => FailureKind::ValidationError,
            _ => FailureKind::Internal,
        }
    }

    /// Identifier of the run this error concerns, if any.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::GeometryConflict { run_id, .. }
            | Self::UnsupportedFont { run_id, .. }
            | Self::DriftUnrecoverable { run_id, .. } => Some(run_id),
            Self::Validation { run_id, .. } => run_id.as_deref(),
            _ => None,
        }
    }

    /// Convert into the serializable record used by outcomes and audit
    /// entries.
    pub fn to_failure(&self) -> RunFailure {
        let (expected_font, observed_font) = match self {
            Self::UnsupportedFont { font, .. } => (Some(font.clone()), None),
            Self::DriftUnrecoverable {
                expected,
                direct_observed,
                preserving_observed,
                ..
            } => (
                Some(expected.clone()),
                preserving_observed.clone().or_else(|| direct_observed.clone()),
            ),
            _ => (None, None),
        };

        RunFailure {
            kind: self.kind(),
            message: self.to_string(),
            run_id: self.run_id().map(str::to_owned),
            expected_font,
            observed_font,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drift_failure_carries_both_fonts() {
        let err = TypekeepError::DriftUnrecoverable {
            run_id: "r1".into(),
            expected: "Times-New-Roman-Bold".into(),
            direct_observed: Some("Times-Bold".into()),
            preserving_observed: None,
            reason: "glyph missing".into(),
        };
        let failure = err.to_failure();
        assert_eq!(failure.kind, FailureKind::DriftUnrecoverable);
        assert_eq!(failure.run_id.as_deref(), Some("r1"));
        assert_eq!(failure.expected_font.as_deref(), Some("Times-New-Roman-Bold"));
        assert_eq!(failure.observed_font.as_deref(), Some("Times-Bold"));
        assert!(failure.message.contains("Times-Bold"));
        assert!(failure.message.contains("nothing"));
    }

    #[test]
    fn unsupported_font_names_the_font() {
        let err = TypekeepError::UnsupportedFont {
            run_id: "r2".into(),
            font: "Garamond".into(),
            reason: "not embedded".into(),
        };
        let failure = err.to_failure();
        assert_eq!(failure.kind, FailureKind::UnsupportedFont);
        assert_eq!(failure.expected_font.as_deref(), Some("Garamond"));
        assert!(failure.observed_font.is_none());
    }

    #[test]
    fn internal_errors_have_no_run() {
        let err = TypekeepError::PdfError("broken xref".into());
        assert_eq!(err.kind(), FailureKind::Internal);
        assert!(err.run_id().is_none());
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::GeometryConflict).unwrap();
        assert_eq!(json, "\"geometry_conflict\"");
    }
}
