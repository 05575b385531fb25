// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Redactor — remove one text run from a page's content stream.
//
// The run's text-showing operator is swapped for a `TJ` that draws nothing
// but moves the text position by the same amount, so any text that follows
// in the same text object stays where it was.

use lopdf::Object;
use lopdf::content::Operation;
use tracing::{debug, instrument, warn};

use typekeep_core::{EngineConfig, Result, TypekeepError};

use crate::locator::{LocatedRun, PageScan};
use crate::pdf::content::ShowOp;
use crate::pdf::document::PdfDocument;
use crate::pdf::objects::real;

/// Axis-aligned box in user space: `(min_x, min_y, max_x, max_y)`.
pub type BBox = (f32, f32, f32, f32);

/// Removes text runs without disturbing surrounding content.
#[derive(Debug, Clone)]
pub struct Redactor {
    overprint_threshold: f32,
}

impl Redactor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            overprint_threshold: config.overprint_threshold,
        }
    }

    /// Blank `located` on its page.
    ///
    /// The page's content is re-read first; if the run's operator has changed
    /// since it was located, or the run cannot be isolated from what is drawn
    /// around it, nothing is modified and `GeometryConflict` is returned.
    #[instrument(skip_all, fields(run = %located.run.id, page = located.run.page))]
    pub fn redact(&self, doc: &mut PdfDocument, located: &LocatedRun) -> Result<()> {
        let scan = PageScan::load(doc, located.run.page)?;
        let show = self.isolate(&scan, located)?.clone();

        let mut operations = scan.operations;
        let index = show.op_index;
        let original = &operations[index];
        let blank = blanking_ops(original, &show);
        debug!(
            operator = %original.operator,
            advance = show.advance,
            "replacing text-showing operator"
        );
        operations.splice(index..=index, blank);
        doc.replace_page_operations(scan.page_id, operations)
    }

    /// Check that `located` is still present and can be removed on its own.
    fn isolate<'a>(&self, scan: &'a PageScan, located: &LocatedRun) -> Result<&'a ShowOp> {
        let conflict = |reason: String| {
            warn!(run = %located.run.id, %reason, "run cannot be redacted");
            TypekeepError::GeometryConflict {
                run_id: located.run.id.clone(),
                reason,
            }
        };

        let show = scan
            .interpretation
            .shows
            .iter()
            .find(|s| s.op_index == located.op_index())
            .filter(|s| s.operator == located.show.operator && s.text == located.run.content)
            .ok_or_else(|| {
                conflict(format!(
                    "operator {} no longer draws {:?}",
                    located.op_index(),
                    located.run.content
                ))
            })?;

        if (4..=7).contains(&show.state.render_mode) {
            return Err(conflict(format!(
                "text render mode {} adds the glyphs to the clipping path",
                show.state.render_mode
            )));
        }
        if !show.render_matrix().is_axis_aligned() {
            return Err(conflict("text is skewed or not rotated by a multiple of 90°".into()));
        }
        if show.state.size == 0.0 {
            return Err(conflict("font size is zero".into()));
        }

        let target = bbox(show);
        let overprinted = scan.interpretation.shows.iter().any(|other| {
            other.op_index != show.op_index
                && other.text == show.text
                && overlap_ratio(target, bbox(other)) >= self.overprint_threshold
        });
        if overprinted {
            return Err(conflict(
                "identical text is drawn over the same area by another operator".into(),
            ));
        }
        Ok(show)
    }
}

/// Operators that replace `original` without drawing anything.
fn blanking_ops(original: &Operation, show: &ShowOp) -> Vec<Operation> {
    let adjust = -show.advance * 1000.0 / show.state.size;
    let tj = Operation::new("TJ", vec![Object::Array(vec![real(adjust)])]);
    match original.operator.as_str() {
        "'" => vec![Operation::new("T*", vec![]), tj],
        "\"" => {
            let mut ops = Vec::with_capacity(4);
            if let [aw, ac, ..] = original.operands.as_slice() {
                ops.push(Operation::new("Tw", vec![aw.clone()]));
                ops.push(Operation::new("Tc", vec![ac.clone()]));
            }
            ops.push(Operation::new("T*", vec![]));
            ops.push(tj);
            ops
        }
        _ => vec![tj],
    }
}

/// User-space box covering the run from baseline to one em above it.
pub fn bbox(show: &ShowOp) -> BBox {
    let m = show.render_matrix();
    let width = show.scaled_advance();
    let (low, high) = (show.state.rise, show.state.rise + show.state.size);
    let corners = [
        m.transform_point(0.0, low),
        m.transform_point(width, low),
        m.transform_point(0.0, high),
        m.transform_point(width, high),
    ];
    corners.iter().fold(
        (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
        |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
    )
}

/// Intersection area over the smaller box's area.
///
/// Degenerate boxes (unknown widths) count as fully overlapping when their
/// corners coincide.
pub fn overlap_ratio(a: BBox, b: BBox) -> f32 {
    let area = |r: BBox| (r.2 - r.0).max(0.0) * (r.3 - r.1).max(0.0);
    let smaller = area(a).min(area(b));
    if smaller <= f32::EPSILON {
        let close = |p: f32, q: f32| (p - q).abs() < 0.5;
        return if close(a.0, b.0) && close(a.1, b.1) { 1.0 } else { 0.0 };
    }
    let w = (a.2.min(b.2) - a.0.max(b.0)).max(0.0);
    let h = (a.3.min(b.3) - a.1.max(b.1)).max(0.0);
    w * h / smaller
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::testing::{single_page_pdf, two_pages_sharing_content};

    fn setup(content: &[u8]) -> (PdfDocument, Locator, Redactor) {
        let config = EngineConfig::default();
        (
            PdfDocument::from_bytes(&single_page_pdf(content)).unwrap(),
            Locator::new(&config),
            Redactor::new(&config),
        )
    }

    fn texts(locator: &Locator, doc: &PdfDocument) -> Vec<String> {
        locator
            .extract_runs(doc)
            .unwrap()
            .into_iter()
            .map(|r| r.run.content)
            .collect()
    }

    #[test]
    fn removes_only_the_target_and_keeps_following_positions() {
        let (mut doc, locator, redactor) = setup(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ( World) Tj ET");
        let before = locator.extract_runs(&doc).unwrap();
        redactor.redact(&mut doc, &before[0]).unwrap();

        let after = locator.extract_runs(&doc).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].run.content, " World");
        assert!((after[0].run.x - before[1].run.x).abs() < 1e-3);
        assert_eq!(after[0].run.id, before[1].run.id);
    }

    #[test]
    fn quote_operator_keeps_line_advance() {
        let (mut doc, locator, redactor) =
            setup(b"BT /F1 10 Tf 14 TL 72 700 Td (one) Tj (two) ' (three) Tj ET");
        let before = locator.extract_runs(&doc).unwrap();
        redactor.redact(&mut doc, &before[1]).unwrap();

        let after = locator.extract_runs(&doc).unwrap();
        assert_eq!(texts(&locator, &doc), vec!["one", "three"]);
        assert_eq!((after[1].run.x, after[1].run.y), (before[2].run.x, before[2].run.y));
    }

    #[test]
    fn double_quote_operator_keeps_spacing_state() {
        let (mut doc, locator, redactor) =
            setup(b"BT /F1 10 Tf 14 TL 72 700 Td 3 1 (a b) \" (c) Tj ET");
        let before = locator.extract_runs(&doc).unwrap();
        redactor.redact(&mut doc, &before[0]).unwrap();

        let after = locator.extract_runs(&doc).unwrap();
        assert_eq!(after.len(), 1);
        assert!((after[0].run.x - before[1].run.x).abs() < 1e-3);
        assert_eq!(after[0].show.state.word_spacing, 3.0);
        assert_eq!(after[0].show.state.char_spacing, 1.0);
    }

    #[test]
    fn shared_content_stays_intact_on_other_pages() {
        let config = EngineConfig::default();
        let mut doc = PdfDocument::from_bytes(&two_pages_sharing_content(
            b"BT /F1 12 Tf 72 700 Td (Shared) Tj ET",
        ))
        .unwrap();
        let locator = Locator::new(&config);
        let target = locator.page_runs(&doc, 0).unwrap().remove(0);
        Redactor::new(&config).redact(&mut doc, &target).unwrap();

        assert!(locator.page_runs(&doc, 0).unwrap().is_empty());
        assert_eq!(locator.page_runs(&doc, 1).unwrap()[0].run.content, "Shared");
    }

    #[test]
    fn stale_run_is_a_conflict() {
        let (mut doc, locator, redactor) = setup(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET");
        let run = locator.extract_runs(&doc).unwrap().remove(0);
        redactor.redact(&mut doc, &run).unwrap();
        let err = redactor.redact(&mut doc, &run).unwrap_err();
        assert!(matches!(err, TypekeepError::GeometryConflict { .. }));
    }

    #[test]
    fn clipping_render_mode_is_a_conflict() {
        let (mut doc, locator, redactor) = setup(b"BT /F1 12 Tf 7 Tr 72 700 Td (Clip) Tj ET");
        let run = locator.extract_runs(&doc).unwrap().remove(0);
        let contents = |doc: &PdfDocument| doc.inner().get_object(doc.page_id(0).unwrap()).unwrap().as_dict().unwrap().get(b"Contents").unwrap().clone();
        let untouched = contents(&doc);
        let err = redactor.redact(&mut doc, &run).unwrap_err();
        assert!(matches!(err, TypekeepError::GeometryConflict { .. }));
        assert_eq!(contents(&doc), untouched);
    }

    #[test]
    fn skewed_text_is_a_conflict() {
        let (mut doc, locator, redactor) = setup(b"BT /F1 12 Tf 1 0 0.3 1 72 700 Tm (Skew) Tj ET");
        let run = locator.extract_runs(&doc).unwrap().remove(0);
        assert!(matches!(
            redactor.redact(&mut doc, &run),
            Err(TypekeepError::GeometryConflict { .. })
        ));
    }

    #[test]
    fn faux_bold_overprint_is_a_conflict() {
        let (mut doc, locator, redactor) = setup(
            b"BT /F1 12 Tf 72 700 Td (Bold) Tj ET BT /F1 12 Tf 72.3 700 Td (Bold) Tj ET",
        );
        let run = locator.extract_runs(&doc).unwrap().remove(0);
        assert!(matches!(
            redactor.redact(&mut doc, &run),
            Err(TypekeepError::GeometryConflict { .. })
        ));
    }

    #[test]
    fn overlap_ratio_basics() {
        assert_eq!(overlap_ratio((0.0, 0.0, 10.0, 10.0), (0.0, 0.0, 10.0, 10.0)), 1.0);
        assert_eq!(overlap_ratio((0.0, 0.0, 10.0, 10.0), (20.0, 0.0, 30.0, 10.0)), 0.0);
        assert!((overlap_ratio((0.0, 0.0, 10.0, 10.0), (5.0, 0.0, 15.0, 10.0)) - 0.5).abs() < 1e-6);
    }
}
