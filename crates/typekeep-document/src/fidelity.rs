// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fidelity check — did the rendered text keep the font it was meant to have?

use crate::pdf::objects::strip_subset_tag;

/// Outcome of comparing an expected font name with an observed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FidelityCheck {
    Faithful,
    Drifted {
        expected: String,
        /// `None` when the backend produced nothing to observe.
        observed: Option<String>,
    },
}

impl FidelityCheck {
    pub fn is_faithful(&self) -> bool {
        matches!(self, Self::Faithful)
    }
}

/// Compare font names, ignoring subset tags. A missing observation is drift.
pub fn check(expected: &str, observed: Option<&str>) -> FidelityCheck {
    match observed {
        Some(observed) if strip_subset_tag(observed) == strip_subset_tag(expected) => {
            FidelityCheck::Faithful
        }
        _ => FidelityCheck::Drifted {
            expected: strip_subset_tag(expected).to_string(),
            observed: observed.map(|o| strip_subset_tag(o).to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_font_is_faithful() {
        assert!(check("Times-New-Roman-Bold", Some("Times-New-Roman-Bold")).is_faithful());
        assert!(check("ABCDEF+Times-New-Roman-Bold", Some("Times-New-Roman-Bold")).is_faithful());
    }

    #[test]
    fn substitution_is_drift_with_both_names() {
        assert_eq!(
            check("Times-New-Roman-Bold", Some("Helvetica-Bold")),
            FidelityCheck::Drifted {
                expected: "Times-New-Roman-Bold".into(),
                observed: Some("Helvetica-Bold".into()),
            }
        );
    }

    #[test]
    fn nothing_observed_is_drift() {
        assert!(!check("Helvetica", None).is_faithful());
    }
}
