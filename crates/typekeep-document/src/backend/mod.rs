// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering backends — draw replacement text where a redacted run used to be.
//
// Both backends share the layout (position, alignment, padding, spacing) and
// the way new text is appended to the page; they differ only in which font
// resource they select and how they encode the text. Appended text is marked
// with the id of the run it replaces.

pub mod direct;
pub mod preserving;

pub use direct::DirectBackend;
pub use preserving::PreservingBackend;

use lopdf::{Object, dictionary};
use lopdf::content::Operation;
use tracing::debug;

use typekeep_core::{
    Alignment, BackendKind, FontDescriptor, Overrides, Result, TextRun, TypekeepError,
    parse_hex_color,
};

use crate::fidelity::{self, FidelityCheck};
use crate::locator::{LocatedRun, Locator, PageScan};
use crate::pdf::content::{Matrix, RUN_KEY, RUN_TAG};
use crate::pdf::document::PdfDocument;
use crate::pdf::objects::real;

/// What a backend produced, as read back from the page.
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub backend: BackendKind,
    /// Font name found on the re-extracted run.
    pub observed_font: String,
    /// Font resource the re-extracted run draws with.
    pub font: Option<FontDescriptor>,
    /// The new run as extracted after rendering.
    pub after: TextRun,
    /// Index of the new text-showing operator.
    pub op_index: usize,
}

impl RenderResult {
    /// Compare the observed font with the font the caller expected.
    pub fn verify(&self, expected: &str) -> FidelityCheck {
        fidelity::check(expected, Some(&self.observed_font))
    }
}

/// Width of text at a size and spacing, before horizontal scaling.
/// `None` when the text cannot be measured in the chosen font.
pub(crate) type Measure<'a> = dyn Fn(&str, f32, f32, f32) -> Option<f32> + 'a;

/// Resolved placement of the replacement text.
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    /// Id of the run being replaced, carried onto the new text.
    pub run_id: String,
    pub text: String,
    pub matrix: Matrix,
    pub size: f32,
    pub char_spacing: f32,
    pub word_spacing: f32,
    pub h_scale: f32,
    pub render_mode: i64,
    pub fill: [f32; 3],
}

/// Work out where and how to draw `replacement` in place of `located`.
///
/// New text is drawn with an identity CTM, so the run's effective size and
/// spacing are carried into text space and the text matrix holds only the
/// rotation and origin.
pub(crate) fn layout(
    located: &LocatedRun,
    replacement: &str,
    overrides: &Overrides,
    padding_tolerance: f32,
    measure: &Measure<'_>,
) -> Result<Layout> {
    const EPS: f32 = 1e-6;
    const MAX_PAD: usize = 512;
    let run = &located.run;
    let show = &located.show;
    let m = show.render_matrix();

    let y_scale = m.y_scale();
    let size = overrides.font_size.unwrap_or(run.font_size);
    let ratio = if run.font_size > EPS { size / run.font_size } else { 1.0 };
    let char_spacing = show.state.char_spacing * y_scale * ratio;
    let base_word_spacing = show.state.word_spacing * y_scale * ratio;
    let h_scale = if y_scale > EPS {
        show.state.h_scale * m.x_scale() / y_scale
    } else {
        show.state.h_scale
    };

    let natural = |text: &str| {
        measure(text, size, char_spacing, base_word_spacing).map(|w| w * h_scale)
    };
    let box_width = run.width;

    let mut text = replacement.to_string();
    if overrides.padding.unwrap_or(false) {
        let width = natural(&text).unwrap_or(0.0);
        if width > padding_tolerance * box_width {
            return Err(TypekeepError::Validation {
                run_id: Some(run.id.clone()),
                reason: format!(
                    "replacement is {:.1}pt wide but the original box is {:.1}pt (limit {:.0}%)",
                    width,
                    box_width,
                    padding_tolerance * 100.0
                ),
            });
        }
        // Each pair of spaces adds the same width; zero or negative
        // spacing means padding cannot widen the text.
        let step = natural(&format!(" {text} ")).map_or(0.0, |w| w - width);
        if step > EPS && box_width > width {
            let pairs = (((box_width - width) / step).floor() as usize).min(MAX_PAD);
            let pad = " ".repeat(pairs);
            text = format!("{pad}{text}{pad}");
        }
    }

    let width = natural(&text).unwrap_or(0.0);
    let (offset, extra_word_spacing) = match overrides.align.unwrap_or(Alignment::Left) {
        Alignment::Left => (0.0, 0.0),
        Alignment::Center => ((box_width - width) / 2.0, 0.0),
        Alignment::Right => (box_width - width, 0.0),
        Alignment::Justify => {
            let spaces = text.chars().filter(|c| *c == ' ').count();
            if spaces > 0 && box_width > width && h_scale > EPS {
                (0.0, (box_width - width) / (spaces as f32 * h_scale))
            } else {
                (0.0, 0.0)
            }
        }
    };

    let angle = overrides
        .rotation
        .or(run.rotation)
        .unwrap_or(0.0)
        .to_radians();
    let (sin, cos) = angle.sin_cos();
    let x = overrides.x.unwrap_or(run.x);
    let y = overrides.y.unwrap_or(run.y);
    let fill = match &overrides.color {
        Some(color) => parse_hex_color(color)?,
        None => show.fill,
    };

    Ok(Layout {
        run_id: run.id.clone(),
        text,
        matrix: Matrix::new(cos, sin, -sin, cos, x + offset * cos, y + offset * sin),
        size,
        char_spacing,
        word_spacing: base_word_spacing + extra_word_spacing,
        h_scale,
        render_mode: show.state.render_mode,
        fill,
    })
}

/// Append a text object drawing `encoded` with font `resource` to the page.
///
/// If the existing content leaves the graphics state altered (CTM, open
/// saves, clipping), it is wrapped in `q`/`Q` first so the new text is drawn
/// in default user space. The new text object sits in a marked-content
/// sequence naming the replaced run. Returns the index of the new `Tj`.
pub(crate) fn append_text(
    doc: &mut PdfDocument,
    page: u32,
    resource: &str,
    encoded: Object,
    layout: &Layout,
) -> Result<usize> {
    let scan = PageScan::load(doc, page)?;
    let leaks = scan.interpretation.leaks_state();
    let mut ops = Vec::with_capacity(scan.operations.len() + 16);

    if leaks {
        ops.push(Operation::new("q", vec![]));
    }
    ops.extend(scan.operations);
    if leaks {
        for _ in 0..=scan.interpretation.open_saves {
            ops.push(Operation::new("Q", vec![]));
        }
    }

    let m = &layout.matrix;
    let [r, g, b] = layout.fill;
    let props = dictionary! {
        RUN_KEY => Object::string_literal(layout.run_id.as_str()),
    };
    ops.push(Operation::new(
        "BDC",
        vec![Object::Name(RUN_TAG.as_bytes().to_vec()), Object::Dictionary(props)],
    ));
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("rg", vec![real(r), real(g), real(b)]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(resource.as_bytes().to_vec()), real(layout.size)],
    ));
    ops.push(Operation::new("Tc", vec![real(layout.char_spacing)]));
    ops.push(Operation::new("Tw", vec![real(layout.word_spacing)]));
    ops.push(Operation::new("Tz", vec![real(layout.h_scale * 100.0)]));
    ops.push(Operation::new("Ts", vec![Object::Integer(0)]));
    ops.push(Operation::new("Tr", vec![Object::Integer(layout.render_mode)]));
    ops.push(Operation::new(
        "Tm",
        vec![real(m.a), real(m.b), real(m.c), real(m.d), real(m.e), real(m.f)],
    ));
    let index = ops.len();
    ops.push(Operation::new("Tj", vec![encoded]));
    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops.push(Operation::new("EMC", vec![]));

    debug!(page, resource, wrapped = leaks, op_index = index, "replacement text appended");
    doc.replace_page_operations(scan.page_id, ops)?;
    Ok(index)
}

/// Re-extract the run drawn by the operator at `op_index`.
pub(crate) fn observe(
    locator: &Locator,
    doc: &PdfDocument,
    page: u32,
    op_index: usize,
    backend: BackendKind,
) -> Result<RenderResult> {
    let scan = PageScan::load(doc, page)?;
    let located = locator
        .runs_in(&scan)
        .into_iter()
        .find(|r| r.op_index() == op_index)
        .ok_or_else(|| {
            TypekeepError::Render(format!(
                "{backend} render left no text at operator {op_index} on page {page}"
            ))
        })?;
    Ok(RenderResult {
        backend,
        observed_font: located.run.font_name.clone(),
        font: located.font,
        after: located.run,
        op_index,
    })
}
