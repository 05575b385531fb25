// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resource-preserving render — draw the replacement with the page's own
// embedded font resource.
//
// Only text the font can draw without guessing is accepted: every character
// must map to a code in the font's encoding with a real glyph behind it.

use lopdf::{Object, StringFormat};
use tracing::{debug, instrument, warn};

use typekeep_core::{BackendKind, EngineConfig, Overrides, Result, TypekeepError};

use super::{RenderResult, append_text, layout, observe};
use crate::locator::{LocatedRun, Locator};
use crate::pdf::document::PdfDocument;
use crate::pdf::fonts::{FontInfo, PageFonts};

/// Backend B.
#[derive(Debug, Clone)]
pub struct PreservingBackend {
    locator: Locator,
    padding_tolerance: f32,
}

impl PreservingBackend {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            locator: Locator::new(config),
            padding_tolerance: config.padding_tolerance,
        }
    }

    /// Draw `replacement` where `located` was, reusing the run's font
    /// resource (or the page font named by a `font_name` override).
    ///
    /// Fails with `UnsupportedFont` when the font is not embedded or cannot
    /// encode the text. The run should already be redacted.
    #[instrument(skip_all, fields(run = %located.run.id, backend = "preserving"))]
    pub fn render(
        &self,
        doc: &mut PdfDocument,
        located: &LocatedRun,
        replacement: &str,
        overrides: &Overrides,
    ) -> Result<RenderResult> {
        let fonts = PageFonts::load(doc, located.page_id)?;
        let unsupported = |font: &str, reason: String| {
            warn!(run = %located.run.id, font, %reason, "font cannot render replacement");
            TypekeepError::UnsupportedFont {
                run_id: located.run.id.clone(),
                font: font.to_string(),
                reason,
            }
        };

        let candidates: Vec<&FontInfo> = match &overrides.font_name {
            Some(name) => fonts.by_base_name(name).collect(),
            None => located
                .font_resource()
                .and_then(|resource| fonts.get(resource))
                .into_iter()
                .collect(),
        };
        let requested = overrides
            .font_name
            .as_deref()
            .unwrap_or(&located.run.font_name);
        if candidates.is_empty() {
            return Err(unsupported(
                requested,
                "no font resource with that name on the page".into(),
            ));
        }

        let mut last_reason = String::new();
        let mut chosen = None;
        for font in candidates {
            if !font.embedded {
                last_reason = format!("{} is not embedded", font.base_font);
                continue;
            }
            match font.encode(replacement) {
                Ok(_) => {
                    chosen = Some(font);
                    break;
                }
                Err(err) => last_reason = err.to_string(),
            }
        }
        let font = chosen.ok_or_else(|| unsupported(requested, last_reason))?;

        let measure = |text: &str, size: f32, tc: f32, tw: f32| {
            font.encode(text)
                .ok()
                .map(|bytes| font.text_width(&bytes, size, tc, tw))
        };
        let layout = layout(located, replacement, overrides, self.padding_tolerance, &measure)?;
        let bytes = font
            .encode(&layout.text)
            .map_err(|err| unsupported(&font.base_font, err.to_string()))?;
        let format = if font.is_composite() {
            StringFormat::Hexadecimal
        } else {
            StringFormat::Literal
        };
        debug!(resource = %font.resource_name, font = %font.base_font, "drawing with original font");

        let index = append_text(
            doc,
            located.run.page,
            &font.resource_name,
            Object::String(bytes, format),
            &layout,
        )?;
        observe(&self.locator, doc, located.run.page, index, BackendKind::Preserving)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redactor::Redactor;
    use crate::testing::{FontSpec, page_pdf, single_page_pdf};

    const CMAP: &[u8] = b"begincmap
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfchar
<0003> <0020>
endbfchar
1 beginbfrange
<0024> <003D> <0041>
endbfrange
endcmap";

    fn redacted(bytes: &[u8]) -> (PdfDocument, LocatedRun) {
        let config = EngineConfig::default();
        let mut doc = PdfDocument::from_bytes(bytes).unwrap();
        let run = Locator::new(&config).extract_runs(&doc).unwrap().remove(0);
        Redactor::new(&config).redact(&mut doc, &run).unwrap();
        (doc, run)
    }

    fn times_bold() -> Vec<u8> {
        page_pdf(
            &[FontSpec::embedded_truetype("F2", "ABCDEF+Times-New-Roman-Bold", "NOdelw")],
            b"BT /F2 14 Tf 50 600 Td (Old) Tj ET",
        )
    }

    #[test]
    fn embedded_font_is_reused() {
        let (mut doc, run) = redacted(&times_bold());
        let result = PreservingBackend::new(&EngineConfig::default())
            .render(&mut doc, &run, "New", &Overrides::default())
            .unwrap();

        assert_eq!(result.backend, BackendKind::Preserving);
        assert_eq!(result.observed_font, "Times-New-Roman-Bold");
        assert!(result.verify("Times-New-Roman-Bold").is_faithful());
        assert_eq!(result.font.unwrap().resource.name, "F2");
        assert_eq!(result.after.content, "New");
        assert_eq!((result.after.x, result.after.y), (50.0, 600.0));
    }

    #[test]
    fn missing_glyph_is_unsupported() {
        let (mut doc, run) = redacted(&times_bold());
        let err = PreservingBackend::new(&EngineConfig::default())
            .render(&mut doc, &run, "New!", &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, TypekeepError::UnsupportedFont { .. }));
    }

    #[test]
    fn non_embedded_font_is_unsupported() {
        let (mut doc, run) = redacted(&single_page_pdf(b"BT /F1 12 Tf 72 700 Td (Old) Tj ET"));
        let err = PreservingBackend::new(&EngineConfig::default())
            .render(&mut doc, &run, "New", &Overrides::default())
            .unwrap_err();
        match err {
            TypekeepError::UnsupportedFont { font, reason, .. } => {
                assert_eq!(font, "Helvetica");
                assert!(reason.contains("not embedded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn font_override_resolves_among_page_fonts() {
        let bytes = page_pdf(
            &[
                FontSpec::standard("F1", "Helvetica"),
                FontSpec::embedded_truetype("F2", "ABCDEF+Times-New-Roman-Bold", "NOdelw"),
            ],
            b"BT /F1 12 Tf 72 700 Td (Old) Tj ET",
        );
        let (mut doc, run) = redacted(&bytes);
        let backend = PreservingBackend::new(&EngineConfig::default());
        let overrides = Overrides {
            font_name: Some("Times-New-Roman-Bold".into()),
            ..Overrides::default()
        };
        let result = backend.render(&mut doc, &run, "New", &overrides).unwrap();
        assert_eq!(result.observed_font, "Times-New-Roman-Bold");

        let absent = Overrides {
            font_name: Some("Garamond".into()),
            ..Overrides::default()
        };
        assert!(matches!(
            backend.render(&mut doc, &run, "New", &absent),
            Err(TypekeepError::UnsupportedFont { .. })
        ));
    }

    #[test]
    fn composite_font_encodes_through_to_unicode() {
        let bytes = page_pdf(
            &[FontSpec::composite("F3", "ABCDEF+NotoSans", CMAP)],
            b"BT /F3 10 Tf 100 100 Td <00240025> Tj ET",
        );
        let (mut doc, run) = redacted(&bytes);
        assert_eq!(run.run.content, "AB");
        let backend = PreservingBackend::new(&EngineConfig::default());
        let result = backend
            .render(&mut doc, &run, "CAB", &Overrides::default())
            .unwrap();
        assert_eq!(result.after.content, "CAB");
        assert_eq!(result.observed_font, "NotoSans");

        let err = backend
            .render(&mut doc, &run, "abc", &Overrides::default())
            .unwrap_err();
        assert!(matches!(err, TypekeepError::UnsupportedFont { .. }));
    }
}
