// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document object model — serializable records for the entities that can be
// extracted from a PDF page.
//
// Field names are stable across entity types (`id`, `page`, `x`, `y`,
// `width`, `height`) because external restore/replay tooling reads them.
// Coordinates are PDF user space with a bottom-left origin; `page` is the
// 0-based page index.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Horizontal alignment of a text run inside its original box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

/// A run of text drawn by a single text-showing operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// Stable, content-independent identifier.
    pub id: String,
    pub page: u32,
    pub content: String,
    pub x: f32,
    /// Baseline of the run.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Base font name with any subset tag removed.
    pub font_name: String,
    pub font_size: f32,
    /// Fill colour as `#rrggbb`.
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<bool>,
}

/// Reference to an indirect PDF object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub number: u32,
    pub generation: u16,
}

/// Where a font lives in a page's resource dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontResourceRef {
    /// Key in the page's `/Font` resource dictionary (e.g. `F1`).
    pub name: String,
    /// Indirect object holding the font dictionary, when not inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<ObjectRef>,
}

/// A font as declared in a page's resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontDescriptor {
    pub font_name: String,
    /// Whether a font program is attached to the document.
    pub embedded: bool,
    /// PDF font subtype (`Type1`, `TrueType`, `Type0`, `Type3`, ...).
    pub subtype: String,
    pub resource: FontResourceRef,
}

// -- Non-text entities --------------------------------------------------------
//
// These are carried for export/import symmetry. The edit engine only operates
// on text runs.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageObject {
    pub id: String,
    pub page: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Comment,
    Marker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationObject {
    pub id: String,
    pub page: u32,
    pub kind: AnnotationKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkObject {
    pub id: String,
    pub page: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// External URI, when the link leaves the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Target page index, when the link is internal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_page: Option<u32>,
}

/// Placeholder for a detected table region. Table structure is not
/// reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePlaceholder {
    pub id: String,
    pub page: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub rows: u32,
    #[serde(default)]
    pub cols: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldKind {
    Text,
    Checkbox,
    Radio,
    Signature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFieldObject {
    pub id: String,
    pub page: u32,
    pub kind: FormFieldKind,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
}

/// Vector shape, described by kind and its control points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum GraphicShape {
    Line { x2: f32, y2: f32 },
    Rectangle,
    Ellipse,
    Polyline { points: Vec<(f32, f32)> },
    Bezier { controls: Vec<(f32, f32)> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicObject {
    pub id: String,
    pub page: u32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(flatten)]
    pub shape: GraphicShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
}

/// Optional content group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerObject {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub object_ids: Vec<String>,
}

/// Visual filter applied to an object (blur, grayscale, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterObject {
    pub id: String,
    pub page: u32,
    pub filter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f32>,
    #[serde(default)]
    pub target_ids: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Any extractable page entity, tagged by `type` when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageObject {
    Text(TextRun),
    Image(ImageObject),
    Annotation(AnnotationObject),
    Link(LinkObject),
    Table(TablePlaceholder),
    FormField(FormFieldObject),
    Graphic(GraphicObject),
    Layer(LayerObject),
    Filter(FilterObject),
}

impl PageObject {
    pub fn id(&self) -> &str {
        match self {
            Self::Text(o) => &o.id,
            Self::Image(o) => &o.id,
            Self::Annotation(o) => &o.id,
            Self::Link(o) => &o.id,
            Self::Table(o) => &o.id,
            Self::FormField(o) => &o.id,
            Self::Graphic(o) => &o.id,
            Self::Layer(o) => &o.id,
            Self::Filter(o) => &o.id,
        }
    }
}

/// Fresh random identifier for entities that have no positional identity.
pub fn new_object_id() -> String {
    Uuid::new_v4().to_string()
}
