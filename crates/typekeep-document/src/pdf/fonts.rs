// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font resolution — turn a page's /Font resources into decoders that map
// string bytes to text and advance widths, and back again.
//
// Simple fonts decode through a base encoding plus /Differences; composite
// (Type0) fonts decode through their ToUnicode CMap, with code widths taken
// from the /Encoding CMap. Widths come from
// /Widths (simple), /W + /DW (composite), or the standard-14 tables.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Object, ObjectId};
use tracing::warn;
use typekeep_core::dom::{FontDescriptor, FontResourceRef, ObjectRef};
use typekeep_core::error::Result;

use crate::pdf::document::PdfDocument;
use crate::pdf::encoding::{BaseEncoding, SimpleEncoding};
use crate::pdf::metrics;
use crate::pdf::objects::{name, number, strip_subset_tag};

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub code: u32,
    /// Text the code stands for; empty when it cannot be decoded.
    pub text: String,
    /// Advance width in glyph units (1/1000 of text space).
    pub width: f32,
    /// Single-byte code 32, the only code word spacing applies to.
    pub is_space: bool,
}

/// Why a character cannot be written with a font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// No code in the font's encoding or ToUnicode map draws the character.
    NotInEncoding(char),
    /// The code exists but the font carries no width for it, so the glyph
    /// may be missing from an embedded subset.
    NoGlyph(char),
    /// A composite font without a ToUnicode map.
    NoUnicodeMap,
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInEncoding(ch) => write!(f, "character {ch:?} is not in the font's encoding"),
            Self::NoGlyph(ch) => write!(f, "character {ch:?} has no glyph width in the font"),
            Self::NoUnicodeMap => f.write_str("composite font has no ToUnicode map"),
        }
    }
}

// -- CMaps --------------------------------------------------------------------

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_text(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| ((pair[0] as u16) << 8) | pair[1] as u16)
        .collect();
    String::from_utf16(&units).ok()
}

/// Largest range expanded; bigger ranges are malformed for our purposes.
const MAX_RANGE: u32 = 0x1_0000;

/// Code-to-text map read from a ToUnicode CMap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToUnicode {
    map: BTreeMap<u32, String>,
}

impl ToUnicode {
    /// Parse a ToUnicode stream; `None` when the CMap is unreadable.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let parsed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            adobe_cmap_parser::get_unicode_map(data)
        }));
        let raw = match parsed {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                warn!(?err, "unreadable ToUnicode CMap");
                return None;
            }
            Err(_) => {
                warn!("ToUnicode CMap parser panicked");
                return None;
            }
        };
        let map = raw
            .into_iter()
            .filter_map(|(code, value)| utf16_text(&value).map(|text| (code, text)))
            .collect();
        Some(Self { map })
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    /// The lowest code mapping to exactly `ch`.
    pub fn reverse(&self, ch: char) -> Option<u32> {
        let mut buf = [0u8; 4];
        let wanted: &str = ch.encode_utf8(&mut buf);
        self.map
            .iter()
            .find(|(_, text)| text.as_str() == wanted)
            .map(|(code, _)| *code)
    }
}

/// Code-to-CID mapping of a composite font's /Encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CidEncoding {
    code_len: usize,
    /// `(lo, hi, first_cid)`; empty means identity.
    ranges: Vec<(u32, u32, u32)>,
}

impl CidEncoding {
    fn identity() -> Self {
        Self {
            code_len: 2,
            ranges: Vec::new(),
        }
    }

    /// Read an embedded encoding CMap, falling back to two-byte identity.
    fn parse(data: &[u8]) -> Self {
        let parsed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            adobe_cmap_parser::get_byte_mapping(data)
        }));
        let mapping = match parsed {
            Ok(Ok(mapping)) => mapping,
            Ok(Err(err)) => {
                warn!(?err, "unreadable encoding CMap, assuming Identity-H");
                return Self::identity();
            }
            Err(_) => {
                warn!("encoding CMap parser panicked, assuming Identity-H");
                return Self::identity();
            }
        };
        let code_len = mapping
            .codespace
            .iter()
            .map(|range| range.width as usize)
            .max()
            .filter(|width| (1..=4).contains(width))
            .unwrap_or(2);
        let ranges = mapping
            .cid
            .iter()
            .filter(|r| r.src_code_hi >= r.src_code_lo && r.src_code_hi - r.src_code_lo < MAX_RANGE)
            .map(|r| (r.src_code_lo, r.src_code_hi, r.dst_CID_lo))
            .collect();
        Self { code_len, ranges }
    }

    fn cid(&self, code: u32) -> u32 {
        if self.ranges.is_empty() {
            return code;
        }
        self.ranges
            .iter()
            .find(|(lo, hi, _)| (*lo..=*hi).contains(&code))
            .map_or(code, |(lo, _, first)| first + (code - lo))
    }
}

// -- Fonts ---------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Program {
    Simple {
        encoding: SimpleEncoding,
        first_char: u32,
        widths: Vec<f32>,
        missing_width: f32,
        /// Glyph-space to 1/1000 scaling (Type3 FontMatrix).
        scale: f32,
    },
    Composite {
        cids: CidEncoding,
        widths: BTreeMap<u32, f32>,
        default_width: f32,
    },
}

/// A font resource of one page, ready to decode and encode strings.
#[derive(Debug, Clone)]
pub struct FontInfo {
    /// Key in the page's /Font dictionary.
    pub resource_name: String,
    pub object: Option<ObjectId>,
    /// /BaseFont without subset tag (resource key for unnamed Type3 fonts).
    pub base_font: String,
    pub subtype: String,
    pub embedded: bool,
    to_unicode: Option<ToUnicode>,
    program: Program,
}

fn has_font_file(descriptor: &Dictionary) -> bool {
    [b"FontFile".as_slice(), b"FontFile2", b"FontFile3"]
        .iter()
        .any(|key| descriptor.has(key))
}

fn dict_entry<'a>(doc: &'a PdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key).ok().and_then(|obj| doc.resolve_dict(obj).ok())
}

fn array_entry<'a>(doc: &'a PdfDocument, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Vec<Object>> {
    match dict.get(key).ok().and_then(|obj| doc.resolve(obj).ok()) {
        Some(Object::Array(items)) => Some(items),
        _ => None,
    }
}

fn load_to_unicode(doc: &PdfDocument, dict: &Dictionary) -> Option<ToUnicode> {
    let obj = dict.get(b"ToUnicode").ok()?;
    match doc.resolve(obj).ok()? {
        Object::Stream(stream) => ToUnicode::parse(&stream_data(stream)),
        _ => None,
    }
}

fn stream_data(stream: &lopdf::Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Predefined CMap names are two-byte; embedded CMaps say for themselves.
fn load_cid_encoding(doc: &PdfDocument, dict: &Dictionary) -> CidEncoding {
    match dict.get(b"Encoding").ok().map(|o| doc.resolve(o)) {
        Some(Ok(Object::Stream(stream))) => CidEncoding::parse(&stream_data(stream)),
        _ => CidEncoding::identity(),
    }
}

/// Parse a CIDFont /W array.
fn parse_cid_widths(doc: &PdfDocument, items: &[Object]) -> BTreeMap<u32, f32> {
    let mut widths = BTreeMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(&items[i]) else {
            i += 1;
            continue;
        };
        let first = first as u32;
        match items.get(i + 1).map(|o| doc.resolve(o)) {
            Some(Ok(Object::Array(list))) => {
                for (offset, w) in list.iter().filter_map(number).enumerate() {
                    widths.insert(first + offset as u32, w);
                }
                i += 2;
            }
            Some(Ok(last)) => {
                if let (Some(last), Some(w)) = (number(last), items.get(i + 2).and_then(number)) {
                    let last = last as u32;
                    if last >= first && last - first < MAX_RANGE {
                        for code in first..=last {
                            widths.insert(code, w);
                        }
                    }
                }
                i += 3;
            }
            _ => break,
        }
    }
    widths
}

impl FontInfo {
    /// Build a decoder for the font dictionary `font` registered as `resource_name`.
    pub fn load(doc: &PdfDocument, resource_name: &str, font: &Object) -> Result<Self> {
        let object = match font {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let dict = doc.resolve_dict(font)?;
        let subtype = dict.get(b"Subtype").ok().and_then(name).unwrap_or_default();
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(name)
            .or_else(|| dict.get(b"Name").ok().and_then(name))
            .map(|n| strip_subset_tag(&n).to_string())
            .unwrap_or_else(|| resource_name.to_string());
        let to_unicode = load_to_unicode(doc, dict);

        if subtype == "Type0" {
            let descendant = array_entry(doc, dict, b"DescendantFonts")
                .and_then(|arr| arr.first())
                .and_then(|obj| doc.resolve_dict(obj).ok());
            let embedded = descendant
                .and_then(|d| dict_entry(doc, d, b"FontDescriptor"))
                .is_some_and(has_font_file);
            let widths = descendant
                .and_then(|d| array_entry(doc, d, b"W"))
                .map(|w| parse_cid_widths(doc, w))
                .unwrap_or_default();
            let default_width = descendant
                .and_then(|d| d.get(b"DW").ok())
                .and_then(number)
                .unwrap_or(1000.0);
            let cids = load_cid_encoding(doc, dict);
            return Ok(Self {
                resource_name: resource_name.to_string(),
                object,
                base_font,
                subtype,
                embedded,
                to_unicode,
                program: Program::Composite {
                    cids,
                    widths,
                    default_width,
                },
            });
        }

        let descriptor = dict_entry(doc, dict, b"FontDescriptor");
        let embedded = if subtype == "Type3" {
            dict.has(b"CharProcs")
        } else {
            descriptor.is_some_and(has_font_file)
        };

        let (base, differences) = match dict.get(b"Encoding").ok().map(|o| doc.resolve(o)) {
            Some(Ok(Object::Name(n))) => (BaseEncoding::named(n), None),
            Some(Ok(Object::Dictionary(enc))) => (
                enc.get(b"BaseEncoding")
                    .ok()
                    .and_then(|o| match o {
                        Object::Name(n) => Some(BaseEncoding::named(n)),
                        _ => None,
                    })
                    .unwrap_or_else(|| default_base(&subtype)),
                array_entry(doc, enc, b"Differences"),
            ),
            _ => (default_base(&subtype), None),
        };
        let mut encoding = SimpleEncoding::new(base);
        if let Some(diffs) = differences {
            encoding.apply_differences(diffs);
        }

        let first_char = dict.get(b"FirstChar").ok().and_then(number).unwrap_or(0.0) as u32;
        let widths: Vec<f32> = array_entry(doc, dict, b"Widths")
            .map(|w| w.iter().map(|o| doc.resolve(o).ok().and_then(number).unwrap_or(0.0)).collect())
            .unwrap_or_default();
        let missing_width = descriptor
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(number)
            .unwrap_or(0.0);
        let scale = if subtype == "Type3" {
            array_entry(doc, dict, b"FontMatrix")
                .and_then(|m| m.first())
                .and_then(number)
                .map_or(1.0, |a| a * 1000.0)
        } else {
            1.0
        };

        Ok(Self {
            resource_name: resource_name.to_string(),
            object,
            base_font,
            subtype,
            embedded,
            to_unicode,
            program: Program::Simple {
                encoding,
                first_char,
                widths,
                missing_width,
                scale,
            },
        })
    }

    /// Serializable description of this font.
    pub fn descriptor(&self) -> FontDescriptor {
        FontDescriptor {
            font_name: self.base_font.clone(),
            embedded: self.embedded,
            subtype: self.subtype.clone(),
            resource: FontResourceRef {
                name: self.resource_name.clone(),
                object: self.object.map(|(number, generation)| ObjectRef { number, generation }),
            },
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.program, Program::Composite { .. })
    }

    fn simple_width(&self, code: u32) -> Option<f32> {
        match &self.program {
            Program::Simple {
                first_char,
                widths,
                scale,
                ..
            } => code
                .checked_sub(*first_char)
                .and_then(|idx| widths.get(idx as usize))
                .map(|w| w * scale),
            Program::Composite { .. } => None,
        }
    }

    fn glyph_width(&self, code: u32, text: &str) -> f32 {
        match &self.program {
            Program::Simple { missing_width, .. } => {
                if let Some(w) = self.simple_width(code) {
                    w
                } else if metrics::is_standard_14(&self.base_font) {
                    text.chars()
                        .next()
                        .map_or(*missing_width, |c| metrics::standard_width(&self.base_font, c))
                } else {
                    *missing_width
                }
            }
            Program::Composite {
                cids,
                widths,
                default_width,
            } => widths.get(&cids.cid(code)).copied().unwrap_or(*default_width),
        }
    }

    /// Decode the bytes of a string operand.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let code_len = match &self.program {
            Program::Simple { .. } => 1,
            Program::Composite { cids, .. } => cids.code_len,
        };
        bytes
            .chunks(code_len)
            .map(|chunk| {
                let code = code_value(chunk);
                let mapped = self.to_unicode.as_ref().and_then(|m| m.lookup(code));
                let text = match (mapped, &self.program) {
                    (Some(t), _) => t.to_string(),
                    (None, Program::Simple { encoding, .. }) => {
                        encoding.decode(code as u8).map(String::from).unwrap_or_default()
                    }
                    (None, Program::Composite { .. }) => String::new(),
                };
                Glyph {
                    code,
                    width: self.glyph_width(code, &text),
                    is_space: chunk.len() == 1 && code == 32,
                    text,
                }
            })
            .collect()
    }

    /// Encode `text` for this font, refusing any character whose glyph is
    /// not certainly present.
    pub fn encode(&self, text: &str) -> std::result::Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(text.len());
        for ch in text.chars() {
            match &self.program {
                Program::Simple { encoding, .. } => {
                    let code = self
                        .to_unicode
                        .as_ref()
                        .and_then(|m| m.reverse(ch))
                        .filter(|c| *c < 256)
                        .map(|c| c as u8)
                        .or_else(|| encoding.encode(ch))
                        .ok_or(EncodeError::NotInEncoding(ch))?;
                    match self.simple_width(code as u32) {
                        Some(w) if w > 0.0 => {}
                        None if !self.embedded && metrics::is_standard_14(&self.base_font) => {}
                        _ => return Err(EncodeError::NoGlyph(ch)),
                    }
                    out.push(code);
                }
                Program::Composite { cids, .. } => {
                    let map = self.to_unicode.as_ref().ok_or(EncodeError::NoUnicodeMap)?;
                    let code = map.reverse(ch).ok_or(EncodeError::NotInEncoding(ch))?;
                    let be = code.to_be_bytes();
                    out.extend_from_slice(&be[4 - cids.code_len..]);
                }
            }
        }
        Ok(out)
    }

    /// Width of `text` in this font at `size`, including character and word
    /// spacing, before horizontal scaling.
    pub fn text_width(&self, bytes: &[u8], size: f32, char_spacing: f32, word_spacing: f32) -> f32 {
        self.decode(bytes)
            .iter()
            .map(|g| {
                g.width / 1000.0 * size + char_spacing + if g.is_space { word_spacing } else { 0.0 }
            })
            .sum()
    }
}

fn default_base(subtype: &str) -> BaseEncoding {
    match subtype {
        "TrueType" => BaseEncoding::WinAnsi,
        "Type3" => BaseEncoding::Builtin,
        _ => BaseEncoding::Standard,
    }
}

// -- Page font tables ----------------------------------------------------------

/// Every font resource of one page, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct PageFonts {
    fonts: BTreeMap<String, FontInfo>,
}

impl PageFonts {
    /// Load the fonts named in the page's (possibly inherited) resources.
    pub fn load(doc: &PdfDocument, page_id: ObjectId) -> Result<Self> {
        let resources = doc.page_resources(page_id)?;
        let mut fonts = BTreeMap::new();
        if let Some(font_dict) = dict_entry(doc, &resources, b"Font") {
            for (key, value) in font_dict.iter() {
                let key = String::from_utf8_lossy(key).into_owned();
                match FontInfo::load(doc, &key, value) {
                    Ok(info) => {
                        fonts.insert(key, info);
                    }
                    Err(err) => warn!(font = %key, %err, "skipping unreadable font resource"),
                }
            }
        }
        Ok(Self { fonts })
    }

    pub fn get(&self, resource_name: &str) -> Option<&FontInfo> {
        self.fonts.get(resource_name)
    }

    /// Fonts whose base name equals `font_name` (subset tags ignored).
    pub fn by_base_name<'a>(&'a self, font_name: &'a str) -> impl Iterator<Item = &'a FontInfo> + 'a {
        let wanted = strip_subset_tag(font_name);
        self.fonts.values().filter(move |f| f.base_font == wanted)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FontInfo> {
        self.fonts.values()
    }
}
