// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Standard-14 fonts — names, family/style matching, and advance widths.
//
// Widths are in glyph units (1/1000 em) for ASCII 0x20..=0x7E. Characters
// outside that range use the family's average width, which is close enough
// for alignment and padding but not for exact layout.

use typekeep_core::FontMatchQuality;

/// Fonts every conforming reader provides without embedding.
pub const STANDARD_14: [&str; 14] = [
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722,
    722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722,
    667, 944, 667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556,
    556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500,
    500, 334, 260, 334, 584,
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722,
    722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722,
    667, 944, 667, 667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611,
    611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556,
    500, 389, 280, 389, 584,
];

const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, 921, 722, 667, 667,
    722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722,
    722, 944, 722, 722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444, 333, 500,
    500, 278, 278, 500, 278, 778, 500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500,
    444, 480, 200, 480, 541,
];

/// Broad typeface family used for substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Serif,
    Sans,
    Mono,
}

/// Whether `name` is one of the standard 14 fonts.
pub fn is_standard_14(name: &str) -> bool {
    STANDARD_14.contains(&name)
}

const MONO: [&str; 5] = ["courier", "mono", "consol", "code", "typewriter"];
const SERIF: [&str; 9] = [
    "times", "roman", "serif", "georgia", "garamond", "cambria", "palatino", "minion", "book",
];
const SANS: [&str; 12] = [
    "helvetica", "arial", "sans", "verdana", "tahoma", "calibri", "segoe", "roboto", "liberation",
    "frutiger", "univers", "gothic",
];
/// Width or weight changes a standard face cannot reproduce.
const VARIANTS: [&str; 10] = [
    "narrow", "condensed", "compressed", "light", "thin", "extended", "expanded", "black",
    "heavy", "ultra",
];

/// Classify an arbitrary font name by family.
pub fn family_of(name: &str) -> Family {
    let lower = name.to_ascii_lowercase();
    if MONO.iter().any(|k| lower.contains(k)) {
        Family::Mono
    } else if !lower.contains("sans") && SERIF.iter().any(|k| lower.contains(k)) {
        Family::Serif
    } else {
        Family::Sans
    }
}

fn is_bold(lower: &str) -> bool {
    ["bold", "black", "heavy", "semibold", "demi"]
        .iter()
        .any(|k| lower.contains(k))
}

fn is_italic(lower: &str) -> bool {
    lower.contains("italic") || lower.contains("oblique")
}

/// The standard text font closest to `name`, by family and style.
///
/// A name that already is a standard text font maps to itself. Symbol and
/// ZapfDingbats are never chosen.
pub fn closest_standard(name: &str) -> &'static str {
    if let Some(exact) = STANDARD_14
        .iter()
        .take(12)
        .find(|candidate| **candidate == name)
    {
        return exact;
    }
    let lower = name.to_ascii_lowercase();
    let (bold, italic) = (is_bold(&lower), is_italic(&lower));
    match (family_of(name), bold, italic) {
        (Family::Serif, false, false) => "Times-Roman",
        (Family::Serif, true, false) => "Times-Bold",
        (Family::Serif, false, true) => "Times-Italic",
        (Family::Serif, true, true) => "Times-BoldItalic",
        (Family::Mono, false, false) => "Courier",
        (Family::Mono, true, false) => "Courier-Bold",
        (Family::Mono, false, true) => "Courier-Oblique",
        (Family::Mono, true, true) => "Courier-BoldOblique",
        (Family::Sans, false, false) => "Helvetica",
        (Family::Sans, true, false) => "Helvetica-Bold",
        (Family::Sans, false, true) => "Helvetica-Oblique",
        (Family::Sans, true, true) => "Helvetica-BoldOblique",
    }
}

/// How faithfully a standard font can stand in for `name`, which is
/// assumed to be neither embedded nor missing.
///
/// A standard text font is exact. A recognised family is similar, or a
/// variant when the name asks for a width or weight the standard face
/// lacks. An unrecognised name falls back to Helvetica.
pub fn match_quality(name: &str) -> FontMatchQuality {
    if STANDARD_14.iter().take(12).any(|candidate| *candidate == name) {
        return FontMatchQuality::Exact;
    }
    let lower = name.to_ascii_lowercase();
    let known = [MONO.as_slice(), SERIF.as_slice(), SANS.as_slice()]
        .iter()
        .any(|keywords| keywords.iter().any(|k| lower.contains(k)));
    if !known {
        FontMatchQuality::Fallback
    } else if VARIANTS.iter().any(|k| lower.contains(k)) {
        FontMatchQuality::Variant
    } else {
        FontMatchQuality::Similar
    }
}

/// Advance width of `ch` in a standard font, in glyph units.
pub fn standard_width(font: &str, ch: char) -> f32 {
    let (table, average): (Option<&[u16; 95]>, f32) = match family_of(font) {
        Family::Mono => return 600.0,
        Family::Serif => (Some(&TIMES_ROMAN), 500.0),
        Family::Sans if is_bold(&font.to_ascii_lowercase()) => (Some(&HELVETICA_BOLD), 556.0),
        Family::Sans => (Some(&HELVETICA), 556.0),
    };
    let cp = ch as u32;
    match table {
        Some(widths) if (0x20..=0x7E).contains(&cp) => widths[(cp - 0x20) as usize] as f32,
        _ => average,
    }
}

/// Width of `text` in a standard font at `size` points, ignoring spacing.
pub fn standard_text_width(font: &str, text: &str, size: f32) -> f32 {
    text.chars().map(|c| standard_width(font, c)).sum::<f32>() * size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_names_map_to_themselves() {
        assert_eq!(closest_standard("Helvetica-Bold"), "Helvetica-Bold");
        assert_eq!(closest_standard("Courier"), "Courier");
    }

    #[test]
    fn substitutes_by_family_and_style() {
        assert_eq!(closest_standard("Times-New-Roman-Bold"), "Times-Bold");
        assert_eq!(closest_standard("ArialMT"), "Helvetica");
        assert_eq!(closest_standard("Arial-BoldItalicMT"), "Helvetica-BoldOblique");
        assert_eq!(closest_standard("DejaVuSansMono"), "Courier");
        assert_eq!(closest_standard("NotoSerif-Italic"), "Times-Italic");
        assert_eq!(closest_standard("OpenSans-Semibold"), "Helvetica-Bold");
    }

    #[test]
    fn symbol_is_never_a_substitute() {
        assert_eq!(closest_standard("Symbol"), "Helvetica");
        assert!(is_standard_14("Symbol"));
    }

    #[test]
    fn match_quality_grades_substitutes() {
        assert_eq!(match_quality("Times-Roman"), FontMatchQuality::Exact);
        assert_eq!(match_quality("ArialMT"), FontMatchQuality::Similar);
        assert_eq!(match_quality("Times-New-Roman-Bold"), FontMatchQuality::Similar);
        assert_eq!(match_quality("Arial-NarrowBold"), FontMatchQuality::Variant);
        assert_eq!(match_quality("HelveticaNeue-Light"), FontMatchQuality::Variant);
        assert_eq!(match_quality("Wingdings"), FontMatchQuality::Fallback);
        assert_eq!(match_quality("Symbol"), FontMatchQuality::Fallback);
    }

    #[test]
    fn widths() {
        assert_eq!(standard_width("Helvetica", 'A'), 667.0);
        assert_eq!(standard_width("Helvetica-Bold", 'i'), 278.0);
        assert_eq!(standard_width("Times-Roman", ' '), 250.0);
        assert_eq!(standard_width("Courier-Bold", 'W'), 600.0);
        assert!((standard_text_width("Helvetica", "Hi", 10.0) - 9.44).abs() < 1e-4);
    }
}
