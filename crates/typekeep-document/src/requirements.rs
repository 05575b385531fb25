// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font requirements — how faithfully each font a document draws with can be
// reproduced when its text is rewritten.

use tracing::{debug, instrument};

use typekeep_core::{FontMatchQuality, FontReport, Result};

use crate::locator::{LocatedRun, Locator};
use crate::pdf::PdfDocument;
use crate::pdf::metrics;

/// Quality of the font `located` would be redrawn with, and the standard
/// font standing in for it when it is not exact.
pub fn run_quality(located: &LocatedRun) -> (FontMatchQuality, Option<&'static str>) {
    match &located.font {
        None => (FontMatchQuality::Missing, None),
        Some(font) if font.embedded => (FontMatchQuality::Exact, None),
        Some(font) => match metrics::match_quality(&font.font_name) {
            FontMatchQuality::Exact => (FontMatchQuality::Exact, None),
            quality => (quality, Some(metrics::closest_standard(&font.font_name))),
        },
    }
}

/// Every font the document's text runs draw with, graded.
#[instrument(skip_all, fields(pages = doc.page_count()))]
pub fn font_report(locator: &Locator, doc: &PdfDocument) -> Result<FontReport> {
    let mut report = FontReport::default();
    for located in locator.extract_runs(doc)? {
        let (quality, substitute) = run_quality(&located);
        let embedded = located.font.as_ref().is_some_and(|f| f.embedded);
        report.record(
            &located.run.font_name,
            embedded,
            quality,
            substitute,
            located.run.page,
        );
    }
    debug!(
        fonts = report.requirements.len(),
        issues = report.has_issues(),
        "font requirements collected"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FontSpec, pages_pdf};
    use typekeep_core::EngineConfig;

    #[test]
    fn grades_each_font_once_per_document() {
        let bytes = pages_pdf(
            &[
                FontSpec::standard("F1", "Helvetica"),
                FontSpec::standard("F2", "ArialNarrow"),
                FontSpec::embedded_truetype("F3", "ABCDEF+Times-New-Roman-Bold", "NOdelw"),
            ],
            &[
                b"BT /F1 10 Tf 10 10 Td (one) Tj /F2 10 Tf 0 20 Td (two) Tj ET",
                b"BT /F1 10 Tf 10 10 Td (three) Tj /F3 10 Tf 0 20 Td (Old) Tj /F9 10 Tf 0 20 Td (gone) Tj ET",
            ],
        );
        let doc = PdfDocument::from_bytes(&bytes).unwrap();
        let report = font_report(&Locator::new(&EngineConfig::default()), &doc).unwrap();

        let find = |name: &str| report.requirements.iter().find(|r| r.font_name == name).unwrap();
        let helvetica = find("Helvetica");
        assert_eq!(helvetica.match_quality, FontMatchQuality::Exact);
        assert_eq!(helvetica.occurrences, 2);
        assert_eq!(helvetica.pages, vec![0, 1]);

        let narrow = find("ArialNarrow");
        assert_eq!(narrow.match_quality, FontMatchQuality::Variant);
        assert_eq!(narrow.substitute.as_deref(), Some("Helvetica"));

        let embedded = find("Times-New-Roman-Bold");
        assert!(embedded.embedded);
        assert_eq!(embedded.match_quality, FontMatchQuality::Exact);

        assert_eq!(find("F9").match_quality, FontMatchQuality::Missing);
        assert!(report.has_issues());
        assert!(report.blocks(true));
        assert!(!report.blocks(false));
    }
}
