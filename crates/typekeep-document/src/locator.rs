// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Locator — extract text runs from page content and match them against
// selectors.
//
// Every text-showing operator that draws at least one character is one run.
// Run ids are derived from the page, the rounded baseline origin and the
// operator's rank among those sharing that origin, so they survive content
// changes and re-extraction. Blanked operators keep their rank. Text drawn by
// an edit carries the edited run's id in a marked-content sequence and takes
// no rank.

use std::collections::HashMap;

use lopdf::ObjectId;
use lopdf::content::Operation;
use tracing::{debug, instrument};
use uuid::Uuid;

use typekeep_core::{
    Cardinality, EngineConfig, FontDescriptor, Result, Selector, TextRun, TypekeepError,
    format_hex_color,
};

use crate::pdf::content::{Interpretation, ShowOp, interpret};
use crate::pdf::document::PdfDocument;
use crate::pdf::fonts::PageFonts;
use crate::pdf::objects::strip_subset_tag;

/// A page's decoded content together with its fonts and interpretation.
#[derive(Debug, Clone)]
pub struct PageScan {
    pub page: u32,
    pub page_id: ObjectId,
    pub operations: Vec<Operation>,
    pub fonts: PageFonts,
    pub interpretation: Interpretation,
}

impl PageScan {
    /// Decode and interpret the page at 0-based `page`.
    pub fn load(doc: &PdfDocument, page: u32) -> Result<Self> {
        let page_id = doc.page_id(page)?;
        let operations = doc.page_operations(page_id)?;
        let fonts = PageFonts::load(doc, page_id)?;
        let interpretation = interpret(&operations, &fonts);
        Ok(Self {
            page,
            page_id,
            operations,
            fonts,
            interpretation,
        })
    }
}

/// A run together with everything later stages need to edit it.
#[derive(Debug, Clone)]
pub struct LocatedRun {
    pub run: TextRun,
    /// `None` when the operator's font resource is missing from the page.
    pub font: Option<FontDescriptor>,
    pub page_id: ObjectId,
    pub show: ShowOp,
}

impl LocatedRun {
    pub fn op_index(&self) -> usize {
        self.show.op_index
    }

    /// Resource name the run's operator selects with `Tf`.
    pub fn font_resource(&self) -> Option<&str> {
        self.show.state.font.as_deref()
    }
}

/// Finds text runs in a document.
#[derive(Debug, Clone)]
pub struct Locator {
    precision: f32,
}

impl Locator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            precision: config.position_precision.max(f32::EPSILON),
        }
    }

    /// Every run on the already-scanned page, in content-stream order.
    pub fn runs_in(&self, scan: &PageScan) -> Vec<LocatedRun> {
        let mut seen: HashMap<(i64, i64), u32> = HashMap::new();
        let mut runs = Vec::new();

        for show in &scan.interpretation.shows {
            let (x, y) = show.origin();
            let id = match &show.marked_run {
                Some(id) => id.clone(),
                None => {
                    let key = (self.snap(x), self.snap(y));
                    let occurrence = seen.entry(key).or_insert(0);
                    let id = run_id(scan.page, key, *occurrence);
                    *occurrence += 1;
                    id
                }
            };
            if show.text.is_empty() {
                continue;
            }

            let font = show
                .state
                .font
                .as_deref()
                .and_then(|name| scan.fonts.get(name));
            let font_name = match (font, show.state.font.as_deref()) {
                (Some(info), _) => strip_subset_tag(&info.base_font).to_string(),
                (None, Some(resource)) => resource.to_string(),
                (None, None) => String::new(),
            };

            let matrix = show.render_matrix();
            let rotation = matrix.rotation_degrees();
            let size = show.effective_size();

            runs.push(LocatedRun {
                run: TextRun {
                    id,
                    page: scan.page,
                    content: show.text.clone(),
                    x,
                    y,
                    width: show.width(),
                    height: size,
                    font_name,
                    font_size: size,
                    color: format_hex_color(show.fill),
                    align: None,
                    rotation: (rotation.abs() > 1e-3).then_some(rotation),
                    padding: None,
                },
                font: font.map(|info| info.descriptor()),
                page_id: scan.page_id,
                show: show.clone(),
            });
        }
        runs
    }

    /// Every run on the page at 0-based `page`.
    pub fn page_runs(&self, doc: &PdfDocument, page: u32) -> Result<Vec<LocatedRun>> {
        Ok(self.runs_in(&PageScan::load(doc, page)?))
    }

    /// Every run in the document, ordered by page and reading position.
    #[instrument(skip_all, fields(pages = doc.page_count()))]
    pub fn extract_runs(&self, doc: &PdfDocument) -> Result<Vec<LocatedRun>> {
        let mut runs = Vec::new();
        for page in 0..doc.page_count() as u32 {
            runs.extend(self.page_runs(doc, page)?);
        }
        debug!(runs = runs.len(), "text runs extracted");
        Ok(runs)
    }

    /// The run with identifier `id`, if it still exists.
    pub fn find_by_id(&self, doc: &PdfDocument, id: &str) -> Result<Option<LocatedRun>> {
        Ok(self
            .extract_runs(doc)?
            .into_iter()
            .find(|located| located.run.id == id))
    }

    /// Runs matched by `selector`.
    ///
    /// Zero matches is `NotFound` unless `allow_empty` is set, in which case
    /// an empty list is returned.
    #[instrument(skip(self, doc), fields(selector = %selector))]
    pub fn locate(
        &self,
        doc: &PdfDocument,
        selector: &Selector,
        allow_empty: bool,
    ) -> Result<Vec<LocatedRun>> {
        let mut matches = match selector {
            Selector::Id { id } => self.find_by_id(doc, id)?.into_iter().collect(),
            Selector::Content { page, text, .. } => {
                let candidates = match page {
                    Some(page) => {
                        if *page as usize >= doc.page_count() {
                            return Err(TypekeepError::validation(format!(
                                "page {} out of range (document has {} pages)",
                                page,
                                doc.page_count()
                            )));
                        }
                        self.page_runs(doc, *page)?
                    }
                    None => self.extract_runs(doc)?,
                };
                candidates
                    .into_iter()
                    .filter(|located| located.run.content.contains(text.as_str()))
                    .collect::<Vec<_>>()
            }
        };

        if selector.cardinality() == Cardinality::First {
            matches.truncate(1);
        }
        if matches.is_empty() && !allow_empty {
            return Err(TypekeepError::NotFound {
                selector: selector.to_string(),
            });
        }
        debug!(matched = matches.len(), "selector resolved");
        Ok(matches)
    }

    fn snap(&self, value: f32) -> i64 {
        (value / self.precision).round() as i64
    }
}

fn run_id(page: u32, origin: (i64, i64), occurrence: u32) -> String {
    let key = format!("typekeep:{}:{}:{}:{}", page, origin.0, origin.1, occurrence);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}
