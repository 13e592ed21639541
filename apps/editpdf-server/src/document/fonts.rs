//! Font decoding and metrics
//!
//! Just enough of each font to turn shown strings into text and advances:
//! code length, widths, Unicode mapping and vertical extent. Nothing here
//! reads glyph programs.

use std::collections::HashMap;

use lopdf::{Dictionary, Object};

use super::classifier::{classify, strip_subset_prefix, CanonicalFont, FontFamily};
use super::encoding::{glyph_name_to_string, BaseEncoding};
use super::model::{number, PdfDocument};

/// Ascent and descent used when a font declares none, per unit of size.
const DEFAULT_ASCENT: f64 = 0.8;
const DEFAULT_DESCENT: f64 = -0.2;

/// Standard 14 widths for codes 32..=126 (WinAnsi layout).
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667,
    778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, 556,
    556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667,
    778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, 611,
    611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    278, 278, 564, 564, 564, 444, 921,
    722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556,
    722, 667, 556, 611, 722, 722, 944, 722, 722, 611,
    333, 278, 333, 469, 500, 333,
    444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, 500,
    500, 333, 389, 278, 500, 500, 722, 500, 500, 444,
    480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500,
    333, 333, 570, 570, 570, 500, 930,
    722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778, 611,
    778, 722, 556, 667, 722, 722, 1000, 722, 722, 667,
    333, 278, 333, 581, 500, 333,
    500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500, 556,
    556, 444, 389, 333, 556, 500, 722, 500, 500, 444,
    394, 220, 394, 520,
];

/// Built-in metrics for a standard 14 font
#[derive(Debug, Clone, Copy)]
pub struct StandardMetrics {
    ascii: Option<&'static [u16; 95]>,
    /// Width of codes outside the ASCII table
    fallback: u16,
    pub ascent: f64,
    pub descent: f64,
}

impl StandardMetrics {
    pub fn for_canonical(font: CanonicalFont) -> Self {
        match font.family {
            FontFamily::Sans => StandardMetrics {
                ascii: Some(if font.bold { &HELVETICA_BOLD_WIDTHS } else { &HELVETICA_WIDTHS }),
                fallback: 556,
                ascent: 0.718,
                descent: -0.207,
            },
            FontFamily::Serif => StandardMetrics {
                ascii: Some(if font.bold { &TIMES_BOLD_WIDTHS } else { &TIMES_WIDTHS }),
                fallback: 500,
                ascent: 0.683,
                descent: -0.217,
            },
            FontFamily::Mono => StandardMetrics {
                ascii: None,
                fallback: 600,
                ascent: 0.629,
                descent: -0.157,
            },
        }
    }

    /// Metrics when `base_font` names a standard 14 font or a common alias.
    pub fn for_name(base_font: &str) -> Option<Self> {
        let lower = base_font.to_ascii_lowercase();
        let known = ["helvetica", "arial", "times", "courier"];
        if !known.iter().any(|k| lower.starts_with(k)) {
            return None;
        }
        Some(Self::for_canonical(classify(base_font, 0)))
    }

    /// Width in thousandths of the font size.
    pub fn width(&self, code: u8) -> f64 {
        let w = match (self.ascii, code) {
            (Some(table), 32..=126) => table[(code - 32) as usize],
            (_, 0xA0) => self.width(32) as u16,
            _ => self.fallback,
        };
        w as f64
    }
}

/// One decoded glyph of a shown string
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Horizontal advance per unit of font size
    pub width: f64,
    /// Single-byte code 32, which receives word spacing
    pub is_space: bool,
}

/// Decoding view of a font resource
#[derive(Debug, Clone)]
pub struct FontInfo {
    /// `BaseFont`, subset prefix removed
    pub base_font: String,
    pub flags: u32,
    pub ascent: f64,
    pub descent: f64,
    two_byte: bool,
    width_scale: f64,
    widths: HashMap<u32, f64>,
    default_width: f64,
    encoding: BaseEncoding,
    differences: HashMap<u8, String>,
    to_unicode: HashMap<u32, String>,
    standard: Option<StandardMetrics>,
}

impl FontInfo {
    /// Stand-in for a font resource that cannot be found.
    pub fn fallback() -> Self {
        let standard = StandardMetrics::for_canonical(CanonicalFont::HELVETICA);
        Self {
            base_font: "Helvetica".to_string(),
            flags: 0,
            ascent: standard.ascent,
            descent: standard.descent,
            two_byte: false,
            width_scale: 0.001,
            widths: HashMap::new(),
            default_width: standard.fallback as f64,
            encoding: BaseEncoding::WinAnsi,
            differences: HashMap::new(),
            to_unicode: HashMap::new(),
            standard: Some(standard),
        }
    }

    pub fn load(doc: &PdfDocument, font: &Dictionary) -> Self {
        let subtype = font
            .get(b"Subtype")
            .and_then(Object::as_name)
            .unwrap_or(b"Type1");
        let base_font = font
            .get(b"BaseFont")
            .and_then(Object::as_name)
            .map(|n| strip_subset_prefix(&String::from_utf8_lossy(n)).to_string())
            .unwrap_or_default();

        let two_byte = subtype == b"Type0";
        let metrics_dict = if two_byte {
            doc.get_resolved(font, b"DescendantFonts")
                .and_then(|obj| obj.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|first| doc.resolve(first).as_dict().ok())
                .unwrap_or(font)
        } else {
            font
        };
        let descriptor = doc.get_dict(metrics_dict, b"FontDescriptor");

        let flags = descriptor
            .and_then(|d| doc.get_number(d, b"Flags"))
            .map(|f| f as i64 as u32)
            .unwrap_or(0);

        let standard = if two_byte { None } else { StandardMetrics::for_name(&base_font) };

        let declared_ascent = descriptor.and_then(|d| doc.get_number(d, b"Ascent")).filter(|v| *v > 0.0);
        let declared_descent = descriptor.and_then(|d| doc.get_number(d, b"Descent")).filter(|v| *v < 0.0);
        let ascent = declared_ascent
            .map(|v| v / 1000.0)
            .or(standard.map(|s| s.ascent))
            .unwrap_or(DEFAULT_ASCENT);
        let descent = declared_descent
            .map(|v| v / 1000.0)
            .or(standard.map(|s| s.descent))
            .unwrap_or(DEFAULT_DESCENT);

        let width_scale = if subtype == b"Type3" {
            doc.get_resolved(font, b"FontMatrix")
                .and_then(|obj| obj.as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|v| number(doc.resolve(v)))
                .filter(|v| *v != 0.0)
                .unwrap_or(0.001)
        } else {
            0.001
        };

        let mut widths = HashMap::new();
        let default_width;
        if two_byte {
            default_width = doc.get_number(metrics_dict, b"DW").unwrap_or(1000.0);
            if let Some(w) = doc.get_resolved(metrics_dict, b"W").and_then(|o| o.as_array().ok()) {
                read_cid_widths(doc, w, &mut widths);
            }
        } else {
            default_width = descriptor
                .and_then(|d| doc.get_number(d, b"MissingWidth"))
                .filter(|w| *w > 0.0)
                .or(standard.map(|s| s.fallback as f64))
                .unwrap_or(500.0);
            let first = doc.get_number(font, b"FirstChar").unwrap_or(0.0) as u32;
            if let Some(w) = doc.get_resolved(font, b"Widths").and_then(|o| o.as_array().ok()) {
                for (i, value) in w.iter().enumerate() {
                    if let Some(width) = number(doc.resolve(value)) {
                        widths.insert(first + i as u32, width);
                    }
                }
            }
        }

        let (encoding, differences) = read_encoding(doc, font, subtype);
        let to_unicode = match doc.get_resolved(font, b"ToUnicode") {
            Some(Object::Stream(stream)) => {
                let data = if stream.dict.has(b"Filter") {
                    stream.decompressed_content().unwrap_or_default()
                } else {
                    stream.content.clone()
                };
                parse_to_unicode(&data)
            }
            _ => HashMap::new(),
        };

        Self {
            base_font,
            flags,
            ascent,
            descent,
            two_byte,
            width_scale,
            widths,
            default_width,
            encoding,
            differences,
            to_unicode,
            standard,
        }
    }

    /// Canonical replacement font for this font.
    pub fn canonical(&self) -> CanonicalFont {
        classify(&self.base_font, self.flags)
    }

    fn width(&self, code: u32) -> f64 {
        if let Some(w) = self.widths.get(&code) {
            return w * self.width_scale;
        }
        match self.standard {
            Some(metrics) if code <= 0xFF && self.widths.is_empty() => metrics.width(code as u8) / 1000.0,
            _ => self.default_width * self.width_scale,
        }
    }

    fn text_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if self.two_byte {
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .unwrap_or('\u{FFFD}')
                .to_string();
        }
        let byte = code as u8;
        if let Some(text) = self.differences.get(&byte).and_then(|n| glyph_name_to_string(n)) {
            return text;
        }
        self.encoding
            .decode(byte)
            .unwrap_or('\u{FFFD}')
            .to_string()
    }

    /// Split a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let step = if self.two_byte { 2 } else { 1 };
        bytes
            .chunks(step)
            .map(|chunk| {
                let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                Glyph {
                    text: self.text_for(code),
                    width: self.width(code),
                    is_space: chunk.len() == 1 && code == 32,
                }
            })
            .collect()
    }
}

fn read_cid_widths(doc: &PdfDocument, w: &[Object], widths: &mut HashMap<u32, f64>) {
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(doc.resolve(&w[i])) else {
            break;
        };
        match w.get(i + 1).map(|o| doc.resolve(o)) {
            Some(Object::Array(list)) => {
                for (offset, value) in list.iter().enumerate() {
                    if let Some(width) = number(doc.resolve(value)) {
                        widths.insert(first as u32 + offset as u32, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (number(last), w.get(i + 2).and_then(|o| number(doc.resolve(o)))) else {
                    break;
                };
                // Guard against absurd ranges in broken files
                let end = (last as u32).min(first as u32 + 0xFFFF);
                for cid in first as u32..=end {
                    widths.insert(cid, width);
                }
                i += 3;
            }
            None => break,
        }
    }
}

fn read_encoding(doc: &PdfDocument, font: &Dictionary, subtype: &[u8]) -> (BaseEncoding, HashMap<u8, String>) {
    let default = if subtype == b"Type1" || subtype == b"MMType1" {
        BaseEncoding::Standard
    } else {
        BaseEncoding::WinAnsi
    };
    let mut differences = HashMap::new();
    let encoding = match doc.get_resolved(font, b"Encoding") {
        Some(Object::Name(name)) => BaseEncoding::from_name(name).unwrap_or(default),
        Some(Object::Dictionary(dict)) => {
            if let Some(diffs) = doc.get_resolved(dict, b"Differences").and_then(|o| o.as_array().ok()) {
                let mut code: u32 = 0;
                for item in diffs {
                    match doc.resolve(item) {
                        Object::Integer(n) => code = *n as u32,
                        Object::Name(name) => {
                            if code <= 0xFF {
                                differences.insert(code as u8, String::from_utf8_lossy(name).into_owned());
                            }
                            code += 1;
                        }
                        _ => {}
                    }
                }
            }
            dict.get(b"BaseEncoding")
                .and_then(Object::as_name)
                .ok()
                .and_then(BaseEncoding::from_name)
                .unwrap_or(default)
        }
        _ => default,
    };
    (encoding, differences)
}

// ============================================================================
// ToUnicode CMaps
// ============================================================================

#[derive(Debug, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

fn tokenize_cmap(data: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => {
                tokens.push(CMapToken::Word("<<".to_string()));
                i += 2;
            }
            b'<' => {
                let start = i + 1;
                let end = data[start..]
                    .iter()
                    .position(|b| *b == b'>')
                    .map(|p| start + p)
                    .unwrap_or(data.len());
                let digits: Vec<u8> = data[start..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .map(|pair| {
                        let s = std::str::from_utf8(pair).unwrap_or("0");
                        let v = u8::from_str_radix(s, 16).unwrap_or(0);
                        if pair.len() == 1 { v << 4 } else { v }
                    })
                    .collect();
                tokens.push(CMapToken::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                tokens.push(CMapToken::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_of(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() == 1 {
        return vec![bytes[0] as u16];
    }
    bytes
        .chunks(2)
        .map(|p| ((p[0] as u16) << 8) | p.get(1).copied().unwrap_or(0) as u16)
        .collect()
}

/// Parse `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(w) if w == "beginbfchar" => {
                i += 1;
                while i + 1 < tokens.len() {
                    match (&tokens[i], &tokens[i + 1]) {
                        (CMapToken::Hex(src), CMapToken::Hex(dst)) => {
                            map.insert(code_of(src), String::from_utf16_lossy(&utf16_of(dst)));
                            i += 2;
                        }
                        _ => break,
                    }
                }
            }
            CMapToken::Word(w) if w == "beginbfrange" => {
                i += 1;
                while i + 2 < tokens.len() {
                    let (CMapToken::Hex(lo), CMapToken::Hex(hi)) = (&tokens[i], &tokens[i + 1]) else {
                        break;
                    };
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    let hi = hi.min(lo.saturating_add(0xFFFF));
                    match &tokens[i + 2] {
                        CMapToken::Hex(dst) => {
                            let base = utf16_of(dst);
                            for (offset, code) in (lo..=hi).enumerate() {
                                let mut units = base.clone();
                                if let Some(last) = units.last_mut() {
                                    *last = last.wrapping_add(offset as u16);
                                }
                                map.insert(code, String::from_utf16_lossy(&units));
                            }
                            i += 3;
                        }
                        CMapToken::ArrayStart => {
                            i += 3;
                            let mut code = lo;
                            while i < tokens.len() {
                                match &tokens[i] {
                                    CMapToken::Hex(dst) => {
                                        if code <= hi {
                                            map.insert(code, String::from_utf16_lossy(&utf16_of(dst)));
                                        }
                                        code += 1;
                                        i += 1;
                                    }
                                    CMapToken::ArrayEnd => {
                                        i += 1;
                                        break;
                                    }
                                    _ => break,
                                }
                            }
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    fn doc_with(objects: impl FnOnce(&mut lopdf::Document) -> Dictionary) -> (PdfDocument, Dictionary) {
        let bytes = super::super::model::fixtures::two_page_pdf();
        let mut doc = PdfDocument::load(&bytes).unwrap();
        let font = objects(doc.inner_mut());
        (doc, font)
    }

    #[test]
    fn test_standard_font_widths() {
        let (doc, font) = doc_with(|_| {
            dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" }
        });
        let info = FontInfo::load(&doc, &font);
        let glyphs = info.decode(b"Hi ");
        assert_eq!(glyphs.len(), 3);
        assert_eq!(glyphs[0].text, "H");
        assert!((glyphs[0].width - 0.722).abs() < 1e-9);
        assert!((glyphs[1].width - 0.222).abs() < 1e-9);
        assert!(glyphs[2].is_space);
        assert!((info.ascent - 0.718).abs() < 1e-9);
    }

    #[test]
    fn test_widths_array_and_differences() {
        let (doc, font) = doc_with(|_| {
            dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => "ABCDEF+Custom",
                "FirstChar" => 65,
                "Widths" => vec![Object::Integer(600), Object::Integer(700)],
                "Encoding" => dictionary! {
                    "BaseEncoding" => "WinAnsiEncoding",
                    "Differences" => vec![Object::Integer(66), Object::Name(b"eacute".to_vec())],
                },
            }
        });
        let info = FontInfo::load(&doc, &font);
        assert_eq!(info.base_font, "Custom");
        let glyphs = info.decode(b"AB\xe9");
        assert_eq!(glyphs[0].text, "A");
        assert!((glyphs[0].width - 0.6).abs() < 1e-9);
        assert_eq!(glyphs[1].text, "é");
        assert!((glyphs[1].width - 0.7).abs() < 1e-9);
        assert_eq!(glyphs[2].text, "é");
        assert!((glyphs[2].width - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_type0_with_to_unicode() {
        let cmap = b"/CIDInit /ProcSet findresource begin\n\
            1 begincodespacerange <0000> <FFFF> endcodespacerange\n\
            2 beginbfchar <0003> <0020> <0024> <0041> endbfchar\n\
            1 beginbfrange <0044> <0046> <0061> endbfrange\n\
            1 beginbfrange <0050> <0051> [<00660069> <00660066>] endbfrange\n\
            endcmap";
        let (doc, font) = doc_with(|inner| {
            let to_unicode = inner.add_object(Stream::new(dictionary! {}, cmap.to_vec()));
            dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => "XYZABC+NotoSans",
                "ToUnicode" => Object::Reference(to_unicode),
                "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "CIDFontType2",
                    "DW" => 900,
                    "W" => vec![
                        Object::Integer(36),
                        Object::Array(vec![Object::Integer(650)]),
                        Object::Integer(68),
                        Object::Integer(70),
                        Object::Integer(540),
                    ],
                })],
            }
        });
        let info = FontInfo::load(&doc, &font);
        let glyphs = info.decode(&[0x00, 0x24, 0x00, 0x03, 0x00, 0x45, 0x00, 0x50, 0x00, 0x10]);
        let text: String = glyphs.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(text, "A bfi\u{FFFD}");
        assert!((glyphs[0].width - 0.65).abs() < 1e-9);
        assert!((glyphs[2].width - 0.54).abs() < 1e-9);
        assert!((glyphs[3].width - 0.9).abs() < 1e-9);
        assert!(!glyphs[1].is_space);
    }

    #[test]
    fn test_classification_through_font_info() {
        let (doc, font) = doc_with(|inner| {
            let descriptor = inner.add_object(dictionary! {
                "Type" => "FontDescriptor",
                "Flags" => 1 + 32,
                "Ascent" => 750,
                "Descent" => -250,
            });
            dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => "SomeCode",
                "FontDescriptor" => Object::Reference(descriptor),
            }
        });
        let info = FontInfo::load(&doc, &font);
        assert_eq!(info.flags, 33);
        assert_eq!(info.canonical().base_font(), "Courier");
        assert!((info.ascent - 0.75).abs() < 1e-9);
        assert!((info.descent + 0.25).abs() < 1e-9);
    }
}
