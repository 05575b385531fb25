// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for engine integration tests: small in-memory PDFs and an
// engine wired to a temporary data directory.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tempfile::TempDir;

use typekeep_audit::AuditLog;
use typekeep_core::{BackupRetention, EngineConfig};
use typekeep_document::PdfDocument;
use typekeep_engine::EngineManager;

/// A font registered under `/Font` on every page.
pub enum Font {
    /// Non-embedded standard-14 Type1 font, WinAnsi encoded.
    Standard(&'static str, &'static str),
    /// Embedded TrueType font with glyphs only for `glyphs` and space.
    Embedded(&'static str, &'static str, &'static str),
}

impl Font {
    fn build(&self, doc: &mut Document) -> (&'static str, ObjectId) {
        match *self {
            Font::Standard(key, base) => (
                key,
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => base,
                    "Encoding" => "WinAnsiEncoding",
                }),
            ),
            Font::Embedded(key, base, glyphs) => {
                let program = doc.add_object(Stream::new(Dictionary::new(), vec![0u8; 64]));
                let descriptor = doc.add_object(dictionary! {
                    "Type" => "FontDescriptor",
                    "FontName" => base,
                    "Flags" => 34,
                    "FontFile2" => program,
                });
                let widths: Vec<Object> = (32u8..=126)
                    .map(|code| {
                        let present = code == b' ' || glyphs.as_bytes().contains(&code);
                        Object::Integer(if present { 600 } else { 0 })
                    })
                    .collect();
                let font = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "TrueType",
                    "BaseFont" => base,
                    "Encoding" => "WinAnsiEncoding",
                    "FirstChar" => 32,
                    "LastChar" => 126,
                    "Widths" => widths,
                    "FontDescriptor" => descriptor,
                });
                (key, font)
            }
        }
    }
}

/// A PDF with one page per entry of `pages`, each drawing that content.
pub fn pdf(fonts: &[Font], pages: &[&str]) -> PdfDocument {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font_dict = Dictionary::new();
    for font in fonts {
        let (key, id) = font.build(&mut doc);
        font_dict.set(key, Object::Reference(id));
    }

    let kids: Vec<Object> = pages
        .iter()
        .map(|content| {
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.as_bytes().to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => font_dict.clone() },
            });
            Object::Reference(page_id)
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    // Round-trip through bytes so the fixture looks like a file from disk.
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save fixture");
    PdfDocument::from_bytes(&bytes).expect("load fixture")
}

/// One page, one embedded Times New Roman Bold run reading "Old".
pub fn times_bold_page(glyphs: &'static str) -> PdfDocument {
    pdf(
        &[Font::Embedded("F1", "Times-New-Roman-Bold", glyphs)],
        &["BT /F1 18 Tf 0.2 0.2 0.2 rg 72 700 Td (Old) Tj ET"],
    )
}

/// One page, Helvetica, with each of `lines` on its own baseline.
pub fn helvetica_lines(lines: &[&str]) -> PdfDocument {
    let mut content = String::from("BT /F1 12 Tf 14 TL 72 720 Td");
    for line in lines {
        content.push_str(&format!(" ({line}) Tj T*"));
    }
    content.push_str(" ET");
    pdf(&[Font::Standard("F1", "Helvetica")], &[&content])
}

pub fn engine(dir: &TempDir) -> EngineManager {
    engine_with(dir, BackupRetention::Always)
}

pub fn engine_with(dir: &TempDir, retention: BackupRetention) -> EngineManager {
    let config = EngineConfig {
        backup_dir: dir.path().join("backups"),
        audit_db: dir.path().join("audit.db"),
        backup_retention: retention,
        ..EngineConfig::default()
    };
    let audit = AuditLog::open(&config.audit_db).expect("open audit log");
    EngineManager::new(config, audit)
}

/// Visible text of every run, in document order.
pub fn visible_text(engine: &EngineManager, doc: &PdfDocument) -> Vec<String> {
    engine
        .text_runs(doc)
        .expect("extract runs")
        .into_iter()
        .map(|run| run.content)
        .collect()
}

/// Number of snapshot files in `dir`.
pub fn snapshot_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
