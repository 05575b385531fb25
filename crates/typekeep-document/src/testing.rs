// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory PDF fixtures for unit tests.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// A font resource to register on a test page.
pub struct FontSpec {
    pub key: &'static str,
    build: Box<dyn Fn(&mut Document) -> ObjectId>,
}

impl FontSpec {
    /// A non-embedded standard-14 Type1 font with WinAnsi encoding.
    pub fn standard(key: &'static str, base: &'static str) -> Self {
        Self {
            key,
            build: Box::new(move |doc| {
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => base,
                    "Encoding" => "WinAnsiEncoding",
                })
            }),
        }
    }

    /// An embedded TrueType font whose /Widths are non-zero only for
    /// `glyphs` (plus the space character).
    pub fn embedded_truetype(key: &'static str, base: &'static str, glyphs: &'static str) -> Self {
        Self {
            key,
            build: Box::new(move |doc| {
                let program = doc.add_object(Stream::new(Dictionary::new(), vec![0u8; 32]));
                let descriptor = doc.add_object(dictionary! {
                    "Type" => "FontDescriptor",
                    "FontName" => base,
                    "Flags" => 34,
                    "FontFile2" => program,
                });
                let widths: Vec<Object> = (32u8..=126)
                    .map(|code| {
                        let present = code == b' ' || glyphs.as_bytes().contains(&code);
                        Object::Integer(if present { 500 } else { 0 })
                    })
                    .collect();
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "TrueType",
                    "BaseFont" => base,
                    "Encoding" => "WinAnsiEncoding",
                    "FirstChar" => 32,
                    "LastChar" => 126,
                    "Widths" => widths,
                    "FontDescriptor" => descriptor,
                })
            }),
        }
    }

    /// An embedded Type0 font with Identity-H encoding and the given
    /// ToUnicode CMap.
    pub fn composite(key: &'static str, base: &'static str, cmap: &'static [u8]) -> Self {
        Self {
            key,
            build: Box::new(move |doc| {
                let program = doc.add_object(Stream::new(Dictionary::new(), vec![0u8; 32]));
                let descriptor = doc.add_object(dictionary! {
                    "Type" => "FontDescriptor",
                    "FontName" => base,
                    "FontFile2" => program,
                });
                let cid_font = doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "CIDFontType2",
                    "BaseFont" => base,
                    "FontDescriptor" => descriptor,
                    "DW" => 600,
                });
                let to_unicode = doc.add_object(Stream::new(Dictionary::new(), cmap.to_vec()));
                doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type0",
                    "BaseFont" => base,
                    "Encoding" => "Identity-H",
                    "DescendantFonts" => vec![Object::Reference(cid_font)],
                    "ToUnicode" => to_unicode,
                })
            }),
        }
    }
}

fn font_dict(doc: &mut Document, fonts: &[FontSpec]) -> Dictionary {
    let mut dict = Dictionary::new();
    for spec in fonts {
        let id = (spec.build)(doc);
        dict.set(spec.key, Object::Reference(id));
    }
    dict
}

fn finish(mut doc: Document, pages_id: ObjectId, kids: Vec<Object>, inherited: Option<Dictionary>) -> Vec<u8> {
    let mut pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
    };
    if let Some(resources) = inherited {
        pages.set("Resources", Object::Dictionary(resources));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}

/// One page using `fonts` and drawing `content`.
pub fn page_pdf(fonts: &[FontSpec], content: &[u8]) -> Vec<u8> {
    pages_pdf(fonts, &[content])
}

/// One page per entry of `contents`, all sharing `fonts` as page resources.
pub fn pages_pdf(fonts: &[FontSpec], contents: &[&[u8]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let fonts = font_dict(&mut doc, fonts);

    let kids = contents
        .iter()
        .map(|content| {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => fonts.clone() },
            });
            Object::Reference(page_id)
        })
        .collect();
    finish(doc, pages_id, kids, None)
}

/// One page with a single Helvetica font registered as `F1`.
pub fn single_page_pdf(content: &[u8]) -> Vec<u8> {
    page_pdf(&[FontSpec::standard("F1", "Helvetica")], content)
}

/// Two pages referencing the same content stream, with resources inherited
/// from the page tree root.
pub fn two_pages_sharing_content(content: &[u8]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let fonts = font_dict(&mut doc, &[FontSpec::standard("F1", "Helvetica")]);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.to_vec()));

    let kids = (0..2)
        .map(|_| {
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            Object::Reference(page_id)
        })
        .collect();
    finish(doc, pages_id, kids, Some(dictionary! { "Font" => fonts }))
}
