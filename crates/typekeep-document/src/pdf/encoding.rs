// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-byte text encodings — the base encodings lopdf knows, with a font's
// /Differences array laid over them.

use std::sync::LazyLock;

use lopdf::{Document, Object, dictionary};

/// Glyph names for 0x20..=0x7E.
const ASCII_NAMES: [&str; 95] = [
    "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand",
    "quotesingle", "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen",
    "period", "slash", "zero", "one", "two", "three", "four", "five", "six", "seven",
    "eight", "nine", "colon", "semicolon", "less", "equal", "greater", "question", "at",
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q",
    "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft", "backslash",
    "bracketright", "asciicircum", "underscore", "grave", "a", "b", "c", "d", "e", "f",
    "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v", "w",
    "x", "y", "z", "braceleft", "bar", "braceright", "asciitilde",
];

/// Glyph names for 0xA0..=0xFF (Latin-1 supplement).
const LATIN1_NAMES: [&str; 96] = [
    "nbspace", "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar",
    "section", "dieresis", "copyright", "ordfeminine", "guillemotleft", "logicalnot",
    "sfthyphen", "registered", "macron", "degree", "plusminus", "twosuperior",
    "threesuperior", "acute", "mu", "paragraph", "periodcentered", "cedilla",
    "onesuperior", "ordmasculine", "guillemotright", "onequarter", "onehalf",
    "threequarters", "questiondown", "Agrave", "Aacute", "Acircumflex", "Atilde",
    "Adieresis", "Aring", "AE", "Ccedilla", "Egrave", "Eacute", "Ecircumflex",
    "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis", "Eth", "Ntilde",
    "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply", "Oslash",
    "Ugrave", "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls",
    "agrave", "aacute", "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla",
    "egrave", "eacute", "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex",
    "idieresis", "eth", "ntilde", "ograve", "oacute", "ocircumflex", "otilde",
    "odieresis", "divide", "oslash", "ugrave", "uacute", "ucircumflex", "udieresis",
    "yacute", "thorn", "ydieresis",
];

/// Names outside Latin-1 that simple fonts commonly remap.
const EXTRA_NAMES: [(&str, char); 31] = [
    ("Euro", '\u{20AC}'),
    ("quotesinglbase", '\u{201A}'),
    ("florin", '\u{0192}'),
    ("quotedblbase", '\u{201E}'),
    ("ellipsis", '\u{2026}'),
    ("dagger", '\u{2020}'),
    ("daggerdbl", '\u{2021}'),
    ("circumflex", '\u{02C6}'),
    ("perthousand", '\u{2030}'),
    ("Scaron", '\u{0160}'),
    ("guilsinglleft", '\u{2039}'),
    ("OE", '\u{0152}'),
    ("Zcaron", '\u{017D}'),
    ("quoteleft", '\u{2018}'),
    ("quoteright", '\u{2019}'),
    ("quotedblleft", '\u{201C}'),
    ("quotedblright", '\u{201D}'),
    ("bullet", '\u{2022}'),
    ("endash", '\u{2013}'),
    ("emdash", '\u{2014}'),
    ("tilde", '\u{02DC}'),
    ("trademark", '\u{2122}'),
    ("scaron", '\u{0161}'),
    ("guilsinglright", '\u{203A}'),
    ("oe", '\u{0153}'),
    ("zcaron", '\u{017E}'),
    ("Ydieresis", '\u{0178}'),
    ("minus", '\u{2212}'),
    ("fi", '\u{FB01}'),
    ("fl", '\u{FB02}'),
    ("dotlessi", '\u{0131}'),
];

/// Map an Adobe glyph name to the character it draws.
///
/// Covers the ASCII and Latin-1 names, the usual typographic extras, and the
/// `uniXXXX` / `uXXXX[XX]` forms.
pub fn glyph_name_to_char(name: &str) -> Option<char> {
    if let Some(idx) = ASCII_NAMES.iter().position(|n| *n == name) {
        return char::from_u32(0x20 + idx as u32);
    }
    if let Some(idx) = LATIN1_NAMES.iter().position(|n| *n == name) {
        return char::from_u32(0xA0 + idx as u32);
    }
    if let Some((_, ch)) = EXTRA_NAMES.iter().find(|(n, _)| *n == name) {
        return Some(*ch);
    }
    let hex = name
        .strip_prefix("uni")
        .filter(|h| h.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len())))?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

// -- Base encodings ------------------------------------------------------------

type CodeTable = [Option<char>; 256];

static WIN_ANSI: LazyLock<CodeTable> = LazyLock::new(|| code_table(b"WinAnsiEncoding"));
static STANDARD: LazyLock<CodeTable> = LazyLock::new(|| code_table(b"StandardEncoding"));
static MAC_ROMAN: LazyLock<CodeTable> = LazyLock::new(|| code_table(b"MacRomanEncoding"));

/// Decode every single-byte code through lopdf's table for the encoding
/// called `name`.
fn code_table(name: &[u8]) -> CodeTable {
    let mut table = [None; 256];
    let font = dictionary! {
        "Type" => "Font",
        "Encoding" => Object::Name(name.to_vec()),
    };
    let doc = Document::new();
    let Ok(encoding) = font.get_font_encoding(&doc) else {
        return table;
    };
    for (code, slot) in table.iter_mut().enumerate().skip(0x20) {
        *slot = Document::decode_text(&encoding, &[code as u8])
            .ok()
            .and_then(|text| single_char(&text));
    }
    // Unused WinAnsi codes render as a bullet; only 0x95 is one.
    if name == b"WinAnsiEncoding" {
        for code in [0x7F, 0x81, 0x8D, 0x8F, 0x90, 0x9D] {
            table[code] = None;
        }
    }
    table
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

/// Base encoding named by a simple font's /Encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    WinAnsi,
    Standard,
    MacRoman,
    /// Font-specific encoding with no usable base (symbolic fonts).
    Builtin,
}

impl BaseEncoding {
    /// The base encoding a PDF name selects. Unknown names are builtin.
    pub fn named(name: &[u8]) -> Self {
        match name {
            b"WinAnsiEncoding" => Self::WinAnsi,
            b"StandardEncoding" => Self::Standard,
            b"MacRomanEncoding" => Self::MacRoman,
            _ => Self::Builtin,
        }
    }

    fn table(self) -> CodeTable {
        match self {
            Self::WinAnsi => *WIN_ANSI,
            Self::Standard => *STANDARD,
            Self::MacRoman => *MAC_ROMAN,
            Self::Builtin => [None; 256],
        }
    }
}

/// Code-to-character table for a simple (single-byte) font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleEncoding {
    table: CodeTable,
}

impl SimpleEncoding {
    pub fn new(base: BaseEncoding) -> Self {
        Self { table: base.table() }
    }

    /// Apply a /Differences array: `[code name name ... code name ...]`.
    pub fn apply_differences(&mut self, differences: &[Object]) {
        let mut code: Option<usize> = None;
        for item in differences {
            match item {
                Object::Integer(start) => {
                    code = usize::try_from(*start).ok();
                }
                Object::Name(name) => {
                    if let Some(c) = code.filter(|c| *c < 256) {
                        let name = String::from_utf8_lossy(name);
                        self.table[c] = glyph_name_to_char(&name);
                        code = Some(c + 1);
                    }
                }
                _ => {}
            }
        }
    }

    pub fn decode(&self, code: u8) -> Option<char> {
        self.table[code as usize]
    }

    /// The code drawing `ch`, preferring the lowest one.
    pub fn encode(&self, ch: char) -> Option<u8> {
        self.table
            .iter()
            .position(|slot| *slot == Some(ch))
            .map(|code| code as u8)
    }
}

/// Encode a whole string as WinAnsi, returning the first character that has
/// no code on failure.
pub fn encode_win_ansi(text: &str) -> Result<Vec<u8>, char> {
    let encoding = SimpleEncoding::new(BaseEncoding::WinAnsi);
    text.chars()
        .map(|ch| encoding.encode(ch).ok_or(ch))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_ansi_covers_the_high_range() {
        let enc = SimpleEncoding::new(BaseEncoding::WinAnsi);
        assert_eq!(enc.encode('€'), Some(0x80));
        assert_eq!(enc.decode(0x97), Some('\u{2014}'));
        assert_eq!(enc.decode(0x81), None);
        assert_eq!(enc.encode('é'), Some(0xE9));
        assert_eq!(enc.encode('\u{2022}'), Some(0x95));
    }

    #[test]
    fn mac_roman_decodes_accented_letters() {
        let enc = SimpleEncoding::new(BaseEncoding::MacRoman);
        assert_eq!(enc.decode(0x8E), Some('é'));
        assert_eq!(enc.decode(0x9F), Some('ü'));
        assert_eq!(enc.decode(b'A'), Some('A'));
        assert_eq!(enc.encode('é'), Some(0x8E));
    }

    #[test]
    fn standard_encoding_uses_curly_quotes() {
        let enc = SimpleEncoding::new(BaseEncoding::Standard);
        assert_eq!(enc.decode(0x27), Some('\u{2019}'));
        assert_eq!(enc.decode(0x60), Some('\u{2018}'));
        assert_eq!(enc.decode(b'z'), Some('z'));
        assert_eq!(enc.decode(0x8E), None);
    }

    #[test]
    fn encode_reports_first_bad_char() {
        assert_eq!(encode_win_ansi("Olá"), Ok(vec![b'O', b'l', 0xE1]));
        assert_eq!(encode_win_ansi("a→b"), Err('→'));
    }

    #[test]
    fn glyph_names() {
        assert_eq!(glyph_name_to_char("A"), Some('A'));
        assert_eq!(glyph_name_to_char("ccedilla"), Some('ç'));
        assert_eq!(glyph_name_to_char("emdash"), Some('\u{2014}'));
        assert_eq!(glyph_name_to_char("uni20AC"), Some('€'));
        assert_eq!(glyph_name_to_char("u1F600"), Some('😀'));
        assert_eq!(glyph_name_to_char("g123"), None);
    }

    #[test]
    fn differences_override_base() {
        let mut enc = SimpleEncoding::new(BaseEncoding::WinAnsi);
        enc.apply_differences(&[
            Object::Integer(65),
            Object::Name(b"Eacute".to_vec()),
            Object::Name(b"eacute".to_vec()),
        ]);
        assert_eq!(enc.decode(65), Some('É'));
        assert_eq!(enc.decode(66), Some('é'));
        assert_eq!(enc.decode(67), Some('C'));
        assert_eq!(enc.encode('A'), None);
        assert_eq!(enc.encode('é'), Some(66));
    }

    #[test]
    fn builtin_encoding_is_empty_until_differences() {
        let mut enc = SimpleEncoding::new(BaseEncoding::Builtin);
        assert_eq!(enc.decode(b'a'), None);
        enc.apply_differences(&[Object::Integer(1), Object::Name(b"a".to_vec())]);
        assert_eq!(enc.decode(1), Some('a'));
    }
}
