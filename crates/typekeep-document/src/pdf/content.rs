// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream interpretation — track the graphics and text state through a
// page's operators and record every text-showing operator with the geometry
// and font it draws with.

use lopdf::Object;
use lopdf::content::Operation;

use crate::pdf::fonts::PageFonts;
use crate::pdf::objects::{name, number, numbers, string_bytes};

/// A 2D affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        match numbers(operands)?.as_slice() {
            [a, b, c, d, e, f] => Some(Self::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Length of the transformed unit x vector.
    pub fn x_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Length of the transformed unit y vector.
    pub fn y_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    /// Rotation of the x axis, in degrees in `[0, 360)`.
    pub fn rotation_degrees(&self) -> f32 {
        self.b.atan2(self.a).to_degrees().rem_euclid(360.0)
    }

    /// True when the matrix maps the axes onto the axes (rotation by a
    /// multiple of 90°, no skew).
    pub fn is_axis_aligned(&self) -> bool {
        const EPS: f32 = 1e-3;
        let scale = self.x_scale().max(self.y_scale()).max(EPS);
        let straight = self.b.abs() / scale < EPS && self.c.abs() / scale < EPS;
        let quarter = self.a.abs() / scale < EPS && self.d.abs() / scale < EPS;
        straight || quarter
    }

    pub fn is_identity(&self) -> bool {
        const EPS: f32 = 1e-6;
        let id = Self::IDENTITY;
        [
            (self.a, id.a),
            (self.b, id.b),
            (self.c, id.c),
            (self.d, id.d),
            (self.e, id.e),
            (self.f, id.f),
        ]
        .iter()
        .all(|(x, y)| (x - y).abs() < EPS)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Text state parameters (PDF 32000-1 §9.3).
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    pub font: Option<String>,
    pub size: f32,
    pub char_spacing: f32,
    pub word_spacing: f32,
    /// Horizontal scaling as a fraction (Tz 100 = 1.0).
    pub h_scale: f32,
    pub leading: f32,
    pub rise: f32,
    pub render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    fill: [f32; 3],
    text: TextState,
}

/// One text-showing operator and everything needed to measure, redraw, or
/// blank it.
#[derive(Debug, Clone)]
pub struct ShowOp {
    /// Index of the operator within the page's operation list.
    pub op_index: usize,
    /// `Tj`, `TJ`, `'` or `"`.
    pub operator: String,
    pub text: String,
    pub state: TextState,
    pub fill: [f32; 3],
    /// Text matrix at the start of the string (after the implicit `T*` of
    /// `'` and `"`).
    pub text_matrix: Matrix,
    pub ctm: Matrix,
    /// Horizontal displacement in text space, before horizontal scaling.
    pub advance: f32,
    /// True when the operator's font resource exists on the page.
    pub font_resolved: bool,
    /// Run id carried by an enclosing `/Typekeep` marked-content sequence.
    pub marked_run: Option<String>,
}

impl ShowOp {
    /// Text space to user space at the start of the string.
    pub fn render_matrix(&self) -> Matrix {
        self.text_matrix.multiply(&self.ctm)
    }

    /// Baseline origin in user space.
    pub fn origin(&self) -> (f32, f32) {
        self.render_matrix().transform_point(0.0, self.state.rise)
    }

    /// Displacement including horizontal scaling, in text space.
    pub fn scaled_advance(&self) -> f32 {
        self.advance * self.state.h_scale
    }

    /// Run width in user space.
    pub fn width(&self) -> f32 {
        (self.scaled_advance() * self.render_matrix().x_scale()).abs()
    }

    /// Font size as it appears on the page.
    pub fn effective_size(&self) -> f32 {
        (self.state.size * self.render_matrix().y_scale()).abs()
    }
}

/// Result of interpreting one page.
#[derive(Debug, Clone, Default)]
pub struct Interpretation {
    pub shows: Vec<ShowOp>,
    /// CTM in force after the last operator.
    pub final_ctm: Matrix,
    /// Unclosed `q` count at the end of the stream.
    pub open_saves: usize,
    /// A clipping path was set outside any `q`/`Q` pair.
    pub clipped_at_base: bool,
}

impl Interpretation {
    /// Whether drawing appended after the stream would inherit state left
    /// behind by it.
    pub fn leaks_state(&self) -> bool {
        !self.final_ctm.is_identity() || self.open_saves > 0 || self.clipped_at_base
    }
}

fn gray_to_rgb(g: f32) -> [f32; 3] {
    [g, g, g]
}

fn cmyk_to_rgb(c: f32, m: f32, y: f32, k: f32) -> [f32; 3] {
    [(1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k)]
}

fn color_from(values: &[f32]) -> Option<[f32; 3]> {
    match values {
        [g] => Some(gray_to_rgb(*g)),
        [r, g, b] => Some([*r, *g, *b]),
        [c, m, y, k] => Some(cmyk_to_rgb(*c, *m, *y, *k)),
        _ => None,
    }
}

/// Marked-content tag wrapping text this crate draws.
pub const RUN_TAG: &str = "Typekeep";

/// Properties key holding the run id inside a [`RUN_TAG`] sequence.
pub const RUN_KEY: &str = "Run";

/// The run id a `BDC` operator opens, if it is one of ours.
fn marked_run_id(operands: &[Object]) -> Option<String> {
    match operands {
        [Object::Name(tag), Object::Dictionary(props)] if tag.as_slice() == RUN_TAG.as_bytes() => {
            string_bytes(props.get(RUN_KEY.as_bytes()).ok()?)
                .map(|id| String::from_utf8_lossy(id).into_owned())
        }
        _ => None,
    }
}

/// Walk `operations` and record every text-showing operator.
pub fn interpret(operations: &[Operation], fonts: &PageFonts) -> Interpretation {
    let mut gs = GraphicsState::default();
    let mut stack: Vec<GraphicsState> = Vec::new();
    let mut tm = Matrix::IDENTITY;
    let mut tlm = Matrix::IDENTITY;
    let mut pending_clip = false;
    let mut clipped_at_base = false;
    let mut marked: Vec<Option<String>> = Vec::new();
    let mut shows = Vec::new();

    for (op_index, op) in operations.iter().enumerate() {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => stack.push(gs.clone()),
            "Q" => {
                if let Some(saved) = stack.pop() {
                    gs = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    gs.ctm = m.multiply(&gs.ctm);
                }
            }
            "W" | "W*" => pending_clip = true,
            "n" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "S" | "s" => {
                if pending_clip && stack.is_empty() {
                    clipped_at_base = true;
                }
                pending_clip = false;
            }

            // -- Marked content --
            "BDC" => marked.push(marked_run_id(operands)),
            "BMC" => marked.push(None),
            "EMC" => {
                marked.pop();
            }

            // -- Colour --
            "g" | "rg" | "k" | "sc" | "scn" => {
                let values: Vec<f32> = operands.iter().filter_map(number).collect();
                if let Some(rgb) = color_from(&values) {
                    gs.fill = rgb;
                }
            }

            // -- Text objects and positioning --
            "BT" => {
                tm = Matrix::IDENTITY;
                tlm = Matrix::IDENTITY;
            }
            "ET" => {}
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    tm = m;
                    tlm = m;
                }
            }
            "Td" | "TD" => {
                if let Some([tx, ty]) = numbers(operands).as_deref().and_then(|v| <[f32; 2]>::try_from(v).ok()) {
                    if op.operator == "TD" {
                        gs.text.leading = -ty;
                    }
                    tlm = Matrix::translation(tx, ty).multiply(&tlm);
                    tm = tlm;
                }
            }
            "T*" => {
                tlm = Matrix::translation(0.0, -gs.text.leading).multiply(&tlm);
                tm = tlm;
            }

            // -- Text state --
            "Tf" => {
                if let [font, size, ..] = operands.as_slice() {
                    gs.text.font = name(font);
                    gs.text.size = number(size).unwrap_or(gs.text.size);
                }
            }
            "Tc" => set_number(operands, &mut gs.text.char_spacing),
            "Tw" => set_number(operands, &mut gs.text.word_spacing),
            "TL" => set_number(operands, &mut gs.text.leading),
            "Ts" => set_number(operands, &mut gs.text.rise),
            "Tz" => {
                if let Some(v) = operands.first().and_then(number) {
                    gs.text.h_scale = v / 100.0;
                }
            }
            "Tr" => {
                if let Some(v) = operands.first().and_then(number) {
                    gs.text.render_mode = v as i64;
                }
            }

            // -- Text showing --
            "Tj" | "TJ" | "'" | "\"" => {
                let mut items: &[Object] = operands;
                if op.operator == "\"" {
                    if let [aw, ac, rest @ ..] = operands.as_slice() {
                        gs.text.word_spacing = number(aw).unwrap_or(gs.text.word_spacing);
                        gs.text.char_spacing = number(ac).unwrap_or(gs.text.char_spacing);
                        items = rest;
                    }
                }
                if op.operator == "'" || op.operator == "\"" {
                    tlm = Matrix::translation(0.0, -gs.text.leading).multiply(&tlm);
                    tm = tlm;
                }

                let mut show = measure(op_index, &op.operator, items, &gs, tm, fonts);
                show.marked_run = marked.iter().rev().find_map(Clone::clone);
                tm = Matrix::translation(show.scaled_advance(), 0.0).multiply(&tm);
                shows.push(show);
            }
            _ => {}
        }
    }

    Interpretation {
        shows,
        final_ctm: gs.ctm,
        open_saves: stack.len(),
        clipped_at_base,
    }
}

fn set_number(operands: &[Object], target: &mut f32) {
    if let Some(v) = operands.first().and_then(number) {
        *target = v;
    }
}

/// Decode and measure the strings of one text-showing operator.
fn measure(
    op_index: usize,
    operator: &str,
    items: &[Object],
    gs: &GraphicsState,
    tm: Matrix,
    fonts: &PageFonts,
) -> ShowOp {
    let ts = &gs.text;
    let font = ts.font.as_deref().and_then(|f| fonts.get(f));
    let mut text = String::new();
    let mut advance = 0.0f32;

    let mut show_string = |bytes: &[u8], text: &mut String, advance: &mut f32| match font {
        Some(font) => {
            for glyph in font.decode(bytes) {
                text.push_str(&glyph.text);
                *advance += glyph.width / 1000.0 * ts.size
                    + ts.char_spacing
                    + if glyph.is_space { ts.word_spacing } else { 0.0 };
            }
        }
        None => {
            // Unknown font: keep the text readable, no width.
            text.extend(bytes.iter().map(|b| *b as char));
        }
    };

    for item in items {
        match item {
            Object::Array(elements) => {
                for element in elements {
                    if let Some(bytes) = string_bytes(element) {
                        show_string(bytes, &mut text, &mut advance);
                    } else if let Some(adjust) = number(element) {
                        advance -= adjust / 1000.0 * ts.size;
                    }
                }
            }
            other => {
                if let Some(bytes) = string_bytes(other) {
                    show_string(bytes, &mut text, &mut advance);
                }
            }
        }
    }

    ShowOp {
        op_index,
        operator: operator.to_string(),
        text,
        state: ts.clone(),
        fill: gs.fill,
        text_matrix: tm,
        ctm: gs.ctm,
        advance,
        font_resolved: font.is_some(),
        marked_run: None,
    }
}
