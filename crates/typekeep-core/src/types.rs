// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edit requests, per-run outcomes, and audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dom::{Alignment, FontDescriptor, TextRun};
use crate::error::{Result, RunFailure, TypekeepError};

/// Unique identifier for one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub Uuid);

impl OperationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OperationId {
    type Err = TypekeepError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| TypekeepError::validation(format!("invalid operation id {s:?}: {e}")))
    }
}

// -- Request ------------------------------------------------------------------

/// How many matches a content selector keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    First,
    All,
}

/// Which text runs an edit applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "lowercase")]
pub enum Selector {
    /// Exactly the run with this identifier.
    Id { id: String },
    /// Runs whose text contains `text`, optionally restricted to one page.
    Content {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
        text: String,
        #[serde(default)]
        cardinality: Cardinality,
    },
}

impl Selector {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Self::Id { .. } => Cardinality::First,
            Self::Content { cardinality, .. } => *cardinality,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id { id } => write!(f, "id={id}"),
            Self::Content {
                page: Some(page),
                text,
                ..
            } => write!(f, "page={page} content={text:?}"),
            Self::Content { page: None, text, .. } => write!(f, "content={text:?}"),
        }
    }
}

/// Which backend(s) the engine may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnginePreference {
    /// Direct render first, resource-preserving render on drift.
    #[default]
    Auto,
    ForceDirect,
    ForcePreserving,
}

/// Optional changes applied on top of the original run's attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<Alignment>,
    /// Centre the new text inside the original box with space padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<bool>,
}

/// A caller-supplied, immutable description of one logical edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    pub selector: Selector,
    pub replacement: String,
    #[serde(default)]
    pub overrides: Overrides,
    #[serde(default)]
    pub engine: EnginePreference,
    /// Zero matches produce an empty outcome list instead of `NotFound`.
    #[serde(default)]
    pub allow_empty: bool,
    /// Reject runs whose font cannot be redrawn exactly.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub strict: bool,
}

impl EditRequest {
    /// Replace the first run containing `search` with `replacement`.
    pub fn replace_first(search: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            selector: Selector::Content {
                page: None,
                text: search.into(),
                cardinality: Cardinality::First,
            },
            replacement: replacement.into(),
            overrides: Overrides::default(),
            engine: EnginePreference::Auto,
            allow_empty: false,
            strict: false,
        }
    }

    /// Replace every run containing `search` with `replacement`.
    pub fn replace_all(search: impl Into<String>, replacement: impl Into<String>) -> Self {
        let mut request = Self::replace_first(search, replacement);
        if let Selector::Content { cardinality, .. } = &mut request.selector {
            *cardinality = Cardinality::All;
        }
        request
    }

    /// Replace the run with identifier `id`.
    pub fn replace_id(id: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            selector: Selector::Id { id: id.into() },
            ..Self::replace_first("", replacement)
        }
    }

    pub fn with_engine(mut self, engine: EnginePreference) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn allowing_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Check the request before any document work starts.
    pub fn validate(&self) -> Result<()> {
        match &self.selector {
            Selector::Id { id } if id.trim().is_empty() => {
                return Err(TypekeepError::validation("selector id is empty"));
            }
            Selector::Content { text, .. } if text.is_empty() => {
                return Err(TypekeepError::validation("selector content is empty"));
            }
            _ => {}
        }

        if self.replacement.is_empty() {
            return Err(TypekeepError::validation("replacement content is empty"));
        }
        if self.replacement.chars().any(|c| c.is_control() && c != '\t') {
            return Err(TypekeepError::validation(
                "replacement contains control characters",
            ));
        }

        let o = &self.overrides;
        if let Some(size) = o.font_size
            && !(size.is_finite() && size > 0.0)
        {
            return Err(TypekeepError::validation(format!(
                "font size override must be positive, got {size}"
            )));
        }
        if let Some(color) = &o.color {
            parse_hex_color(color)?;
        }
        if let Some(name) = &o.font_name
            && name.trim().is_empty()
        {
            return Err(TypekeepError::validation("font name override is empty"));
        }
        for (label, value) in [("x", o.x), ("y", o.y), ("rotation", o.rotation)] {
            if let Some(v) = value
                && !v.is_finite()
            {
                return Err(TypekeepError::validation(format!(
                    "{label} override is not a finite number"
                )));
            }
        }
        Ok(())
    }
}

/// Parse `#rrggbb` (leading `#` optional) into RGB components in `0..=1`.
pub fn parse_hex_color(color: &str) -> Result<[f32; 3]> {
    let hex = color.trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TypekeepError::validation(format!(
            "colour {color:?} is not #rrggbb"
        )));
    }
    let mut rgb = [0.0f32; 3];
    for (i, slot) in rgb.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| TypekeepError::validation(format!("colour {color:?} is not #rrggbb")))?;
        *slot = byte as f32 / 255.0;
    }
    Ok(rgb)
}

/// Format RGB components in `0..=1` as `#rrggbb`.
pub fn format_hex_color(rgb: [f32; 3]) -> String {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        to_byte(rgb[0]),
        to_byte(rgb[1]),
        to_byte(rgb[2])
    )
}

// -- Outcome ------------------------------------------------------------------

/// The two rendering backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Draws fresh text with a standard font.
    Direct,
    /// Reuses the page's original font resource.
    Preserving,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Preserving => f.write_str("preserving"),
        }
    }
}

/// Final font-fidelity classification of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FidelityVerdict {
    Faithful,
    DriftedAndRecovered,
    DriftedAndUnrecoverable,
}

/// One backend attempt within a run's state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendAttempt {
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_font: Option<String>,
    pub faithful: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of the edit for a single matched run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOutcome {
    pub run_id: String,
    pub page: u32,
    pub before: TextRun,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<TextRun>,
    /// Backend that produced the final result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
    /// Font actually used by the final result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontDescriptor>,
    /// Absent when the run was rejected before rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<FidelityVerdict>,
    #[serde(default)]
    pub attempts: Vec<BackendAttempt>,
    /// Whether the document carries this run's edit.
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
    /// Fingerprint of the document this outcome belongs to.
    pub document_id: String,
}

// -- Audit --------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    EditText,
    Replay,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EditText => "edit-text",
            Self::Replay => "replay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Every matched run was applied.
    Success,
    /// Some runs were applied and some failed.
    Partial,
    /// Nothing was applied.
    Failed,
    /// The batch was abandoned part-way.
    Cancelled,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One append-only record per top-level edit invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub operation_id: OperationId,
    pub operation_kind: OperationKind,
    pub timestamp: DateTime<Utc>,
    pub status: OperationStatus,
    pub input_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    /// The request as given.
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub outcomes: Vec<EditOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_location: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

// -- Font requirements ----------------------------------------------------------

/// How closely a run's font can be reproduced when its text is redrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontMatchQuality {
    /// The font program is embedded, or the font is a standard text font.
    Exact,
    /// A standard font of the same family and style stands in.
    Similar,
    /// The family matches but a width or weight variant is lost.
    Variant,
    /// The family is unknown and Helvetica stands in.
    Fallback,
    /// The run's font resource is absent from the page.
    Missing,
}

impl FontMatchQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Similar => "similar",
            Self::Variant => "variant",
            Self::Fallback => "fallback",
            Self::Missing => "missing",
        }
    }

    /// Whether an edit with this font is likely to look different.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Variant | Self::Fallback | Self::Missing)
    }
}

impl std::fmt::Display for FontMatchQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One font used by the document's text, and how well it can be redrawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontRequirement {
    pub font_name: String,
    pub embedded: bool,
    pub match_quality: FontMatchQuality,
    /// Standard font the direct render would draw with instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitute: Option<String>,
    /// Number of runs drawn with this font.
    pub occurrences: u32,
    /// 0-based pages the font appears on, ascending.
    pub pages: Vec<u32>,
}

/// Fonts a document's text depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontReport {
    pub requirements: Vec<FontRequirement>,
}

impl FontReport {
    /// Count one run drawn with `font_name` on `page`.
    ///
    /// The first sighting of a font fixes its quality and substitute.
    pub fn record(
        &mut self,
        font_name: &str,
        embedded: bool,
        match_quality: FontMatchQuality,
        substitute: Option<&str>,
        page: u32,
    ) {
        if let Some(existing) = self
            .requirements
            .iter_mut()
            .find(|r| r.font_name == font_name)
        {
            existing.occurrences += 1;
            if !existing.pages.contains(&page) {
                existing.pages.push(page);
                existing.pages.sort_unstable();
            }
            return;
        }
        self.requirements.push(FontRequirement {
            font_name: font_name.to_string(),
            embedded,
            match_quality,
            substitute: substitute.map(str::to_string),
            occurrences: 1,
            pages: vec![page],
        });
    }

    pub fn has_issues(&self) -> bool {
        self.requirements
            .iter()
            .any(|r| r.match_quality.needs_attention())
    }

    /// Whether an edit should be refused. Only strict mode refuses, and
    /// then for anything short of an exact match.
    pub fn blocks(&self, strict: bool) -> bool {
        strict
            && self
                .requirements
                .iter()
                .any(|r| r.match_quality != FontMatchQuality::Exact)
    }
}

impl AuditEntry {
    /// Recover the request that produced this entry.
    pub fn request(&self) -> Result<EditRequest> {
        Ok(serde_json::from_value(self.parameters.clone())?)
    }
}
