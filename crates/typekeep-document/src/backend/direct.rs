// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Direct render — draw the replacement with a standard-14 font.
//
// Works for any run and any WinAnsi text, at the cost of substituting the
// original typeface whenever it is not itself a standard font.

use lopdf::{Object, StringFormat, dictionary};
use tracing::{debug, instrument};

use typekeep_core::{BackendKind, EngineConfig, Overrides, Result, TypekeepError};

use super::{RenderResult, append_text, layout, observe};
use crate::locator::{LocatedRun, Locator};
use crate::pdf::document::PdfDocument;
use crate::pdf::encoding::encode_win_ansi;
use crate::pdf::fonts::PageFonts;
use crate::pdf::metrics::{closest_standard, standard_text_width};

/// Prefix of font resource names added by this backend.
const RESOURCE_PREFIX: &str = "TK";

/// Backend A.
#[derive(Debug, Clone)]
pub struct DirectBackend {
    locator: Locator,
    padding_tolerance: f32,
}

impl DirectBackend {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            locator: Locator::new(config),
            padding_tolerance: config.padding_tolerance,
        }
    }

    /// Draw `replacement` where `located` was, using the standard font
    /// closest to the requested one. The run should already be redacted.
    #[instrument(skip_all, fields(run = %located.run.id, backend = "direct"))]
    pub fn render(
        &self,
        doc: &mut PdfDocument,
        located: &LocatedRun,
        replacement: &str,
        overrides: &Overrides,
    ) -> Result<RenderResult> {
        let requested = overrides
            .font_name
            .as_deref()
            .unwrap_or(&located.run.font_name);
        let font = closest_standard(requested);

        let measure = |text: &str, size: f32, tc: f32, tw: f32| {
            let glyphs = text.chars().count() as f32;
            let spaces = text.chars().filter(|c| *c == ' ').count() as f32;
            Some(standard_text_width(font, text, size) + glyphs * tc + spaces * tw)
        };
        let layout = layout(located, replacement, overrides, self.padding_tolerance, &measure)?;

        let bytes = encode_win_ansi(&layout.text).map_err(|ch| {
            TypekeepError::Render(format!("character {ch:?} has no WinAnsi code in {font}"))
        })?;
        let resource = standard_font_resource(doc, located.page_id, font)?;
        debug!(requested, substitute = font, resource = %resource, "drawing with standard font");

        let index = append_text(
            doc,
            located.run.page,
            &resource,
            Object::String(bytes, StringFormat::Literal),
            &layout,
        )?;
        observe(&self.locator, doc, located.run.page, index, BackendKind::Direct)
    }
}

/// Name of a page font resource for the standard font `base_font`, adding
/// one when the page has none yet.
fn standard_font_resource(
    doc: &mut PdfDocument,
    page_id: lopdf::ObjectId,
    base_font: &str,
) -> Result<String> {
    let fonts = PageFonts::load(doc, page_id)?;
    if let Some(existing) = fonts
        .iter()
        .find(|f| f.resource_name.starts_with(RESOURCE_PREFIX) && f.base_font == base_font)
    {
        return Ok(existing.resource_name.clone());
    }

    let name = (1..)
        .map(|n| format!("{RESOURCE_PREFIX}{n}"))
        .find(|candidate| fonts.get(candidate).is_none())
        .unwrap_or_else(|| RESOURCE_PREFIX.to_string());
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base_font,
        "Encoding" => "WinAnsiEncoding",
    });
    doc.page_fonts_mut(page_id)?
        .set(name.as_str(), Object::Reference(font_id));
    Ok(name)
}
