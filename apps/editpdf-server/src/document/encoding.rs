//! Single-byte text encodings
//!
//! Tables for the base encodings simple fonts use, plus the subset of glyph
//! names that show up in `/Differences` arrays in practice.

/// Base encoding of a simple font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
}

impl BaseEncoding {
    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"WinAnsiEncoding" => Some(Self::WinAnsi),
            b"MacRomanEncoding" => Some(Self::MacRoman),
            b"StandardEncoding" => Some(Self::Standard),
            _ => None,
        }
    }

    pub fn decode(self, code: u8) -> Option<char> {
        match self {
            Self::WinAnsi => winansi_to_char(code),
            Self::MacRoman => macroman_to_char(code),
            Self::Standard => standard_to_char(code),
        }
    }
}

/// WinAnsi codes 0x80..=0x9F. `None` marks undefined codes.
const WINANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

/// MacRoman codes 0x80..=0xFF.
const MACROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è',
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü',
    '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø',
    '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø',
    '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{00A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ',
    '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›', 'ﬁ', 'ﬂ',
    '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô',
    '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];

pub fn winansi_to_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E => Some(code as char),
        0x80..=0x9F => WINANSI_HIGH[(code - 0x80) as usize],
        0xA0..=0xFF => Some(code as char),
        _ => None,
    }
}

/// Encode one character into WinAnsi.
pub fn char_to_winansi(c: char) -> Option<u8> {
    let cp = c as u32;
    match cp {
        0x20..=0x7E | 0xA0..=0xFF => Some(cp as u8),
        _ => WINANSI_HIGH
            .iter()
            .position(|entry| *entry == Some(c))
            .map(|i| 0x80 + i as u8),
    }
}

pub fn macroman_to_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E => Some(code as char),
        0x80..=0xFF => Some(MACROMAN_HIGH[(code - 0x80) as usize]),
        _ => None,
    }
}

pub fn standard_to_char(code: u8) -> Option<char> {
    let c = match code {
        0x27 => '’',
        0x60 => '‘',
        0x20..=0x7E => code as char,
        0xA1 => '¡',
        0xA2 => '¢',
        0xA3 => '£',
        0xA4 => '⁄',
        0xA5 => '¥',
        0xA6 => 'ƒ',
        0xA7 => '§',
        0xA8 => '¤',
        0xA9 => '\'',
        0xAA => '“',
        0xAB => '«',
        0xAC => '‹',
        0xAD => '›',
        0xAE => 'ﬁ',
        0xAF => 'ﬂ',
        0xB1 => '–',
        0xB2 => '†',
        0xB3 => '‡',
        0xB4 => '·',
        0xB6 => '¶',
        0xB7 => '•',
        0xB8 => '‚',
        0xB9 => '„',
        0xBA => '”',
        0xBB => '»',
        0xBC => '…',
        0xBD => '‰',
        0xBF => '¿',
        0xC1 => '`',
        0xC2 => '´',
        0xC3 => 'ˆ',
        0xC4 => '˜',
        0xC5 => '¯',
        0xC6 => '˘',
        0xC7 => '˙',
        0xC8 => '¨',
        0xCA => '˚',
        0xCB => '¸',
        0xCD => '˝',
        0xCE => '˛',
        0xCF => 'ˇ',
        0xD0 => '—',
        0xE1 => 'Æ',
        0xE3 => 'ª',
        0xE8 => 'Ł',
        0xE9 => 'Ø',
        0xEA => 'Œ',
        0xEB => 'º',
        0xF1 => 'æ',
        0xF5 => 'ı',
        0xF8 => 'ł',
        0xF9 => 'ø',
        0xFA => 'œ',
        0xFB => 'ß',
        _ => return None,
    };
    Some(c)
}

const NAMED_GLYPHS: &[(&str, &str)] = &[
    ("space", " "),
    ("exclam", "!"),
    ("quotedbl", "\""),
    ("numbersign", "#"),
    ("dollar", "$"),
    ("percent", "%"),
    ("ampersand", "&"),
    ("quotesingle", "'"),
    ("quoteright", "’"),
    ("quoteleft", "‘"),
    ("parenleft", "("),
    ("parenright", ")"),
    ("asterisk", "*"),
    ("plus", "+"),
    ("comma", ","),
    ("hyphen", "-"),
    ("minus", "−"),
    ("period", "."),
    ("slash", "/"),
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("colon", ":"),
    ("semicolon", ";"),
    ("less", "<"),
    ("equal", "="),
    ("greater", ">"),
    ("question", "?"),
    ("at", "@"),
    ("bracketleft", "["),
    ("backslash", "\\"),
    ("bracketright", "]"),
    ("asciicircum", "^"),
    ("underscore", "_"),
    ("grave", "`"),
    ("braceleft", "{"),
    ("bar", "|"),
    ("braceright", "}"),
    ("asciitilde", "~"),
    ("bullet", "•"),
    ("endash", "–"),
    ("emdash", "—"),
    ("quotedblleft", "“"),
    ("quotedblright", "”"),
    ("quotesinglbase", "‚"),
    ("quotedblbase", "„"),
    ("ellipsis", "…"),
    ("dagger", "†"),
    ("daggerdbl", "‡"),
    ("perthousand", "‰"),
    ("trademark", "™"),
    ("copyright", "©"),
    ("registered", "®"),
    ("degree", "°"),
    ("section", "§"),
    ("paragraph", "¶"),
    ("Euro", "€"),
    ("sterling", "£"),
    ("yen", "¥"),
    ("cent", "¢"),
    ("florin", "ƒ"),
    ("multiply", "×"),
    ("divide", "÷"),
    ("plusminus", "±"),
    ("fi", "fi"),
    ("fl", "fl"),
    ("ff", "ff"),
    ("ffi", "ffi"),
    ("ffl", "ffl"),
    ("germandbls", "ß"),
    ("dotlessi", "ı"),
    ("nbspace", "\u{00A0}"),
    ("guillemotleft", "«"),
    ("guillemotright", "»"),
    ("guilsinglleft", "‹"),
    ("guilsinglright", "›"),
    ("AE", "Æ"),
    ("ae", "æ"),
    ("OE", "Œ"),
    ("oe", "œ"),
    ("Oslash", "Ø"),
    ("oslash", "ø"),
];

/// Diacritic suffixes of Latin glyph names (`eacute`, `Udieresis`, ...).
const ACCENTS: &[(&str, char)] = &[
    ("acute", '\u{0301}'),
    ("grave", '\u{0300}'),
    ("circumflex", '\u{0302}'),
    ("dieresis", '\u{0308}'),
    ("tilde", '\u{0303}'),
    ("ring", '\u{030A}'),
    ("cedilla", '\u{0327}'),
    ("caron", '\u{030C}'),
];

/// Precomposed Latin-1 letters keyed by base letter and combining mark.
fn compose(base: char, mark: char) -> Option<char> {
    const TABLE: &[(char, char, char)] = &[
        ('a', '\u{0301}', 'á'), ('a', '\u{0300}', 'à'), ('a', '\u{0302}', 'â'),
        ('a', '\u{0308}', 'ä'), ('a', '\u{0303}', 'ã'), ('a', '\u{030A}', 'å'),
        ('e', '\u{0301}', 'é'), ('e', '\u{0300}', 'è'), ('e', '\u{0302}', 'ê'),
        ('e', '\u{0308}', 'ë'), ('i', '\u{0301}', 'í'), ('i', '\u{0300}', 'ì'),
        ('i', '\u{0302}', 'î'), ('i', '\u{0308}', 'ï'), ('o', '\u{0301}', 'ó'),
        ('o', '\u{0300}', 'ò'), ('o', '\u{0302}', 'ô'), ('o', '\u{0308}', 'ö'),
        ('o', '\u{0303}', 'õ'), ('u', '\u{0301}', 'ú'), ('u', '\u{0300}', 'ù'),
        ('u', '\u{0302}', 'û'), ('u', '\u{0308}', 'ü'), ('y', '\u{0301}', 'ý'),
        ('y', '\u{0308}', 'ÿ'), ('n', '\u{0303}', 'ñ'), ('c', '\u{0327}', 'ç'),
        ('s', '\u{030C}', 'š'), ('z', '\u{030C}', 'ž'),
        ('A', '\u{0301}', 'Á'), ('A', '\u{0300}', 'À'), ('A', '\u{0302}', 'Â'),
        ('A', '\u{0308}', 'Ä'), ('A', '\u{0303}', 'Ã'), ('A', '\u{030A}', 'Å'),
        ('E', '\u{0301}', 'É'), ('E', '\u{0300}', 'È'), ('E', '\u{0302}', 'Ê'),
        ('E', '\u{0308}', 'Ë'), ('I', '\u{0301}', 'Í'), ('I', '\u{0300}', 'Ì'),
        ('I', '\u{0302}', 'Î'), ('I', '\u{0308}', 'Ï'), ('O', '\u{0301}', 'Ó'),
        ('O', '\u{0300}', 'Ò'), ('O', '\u{0302}', 'Ô'), ('O', '\u{0308}', 'Ö'),
        ('O', '\u{0303}', 'Õ'), ('U', '\u{0301}', 'Ú'), ('U', '\u{0300}', 'Ù'),
        ('U', '\u{0302}', 'Û'), ('U', '\u{0308}', 'Ü'), ('Y', '\u{0301}', 'Ý'),
        ('Y', '\u{0308}', 'Ÿ'), ('N', '\u{0303}', 'Ñ'), ('C', '\u{0327}', 'Ç'),
        ('S', '\u{030C}', 'Š'), ('Z', '\u{030C}', 'Ž'),
    ];
    TABLE
        .iter()
        .find(|(b, m, _)| *b == base && *m == mark)
        .map(|(_, _, c)| *c)
}

/// Map a glyph name to text. Unknown names yield `None`.
pub fn glyph_name_to_string(name: &str) -> Option<String> {
    if name.chars().count() == 1 && name.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(name.to_string());
    }
    if let Some((_, text)) = NAMED_GLYPHS.iter().find(|(n, _)| *n == name) {
        return Some((*text).to_string());
    }
    // uniXXXX and uXXXX[XX] forms
    let hex = name
        .strip_prefix("uni")
        .filter(|h| h.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len())));
    if let Some(hex) = hex {
        if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
            return Some(c.to_string());
        }
    }
    for (suffix, mark) in ACCENTS {
        if let Some(base) = name.strip_suffix(suffix) {
            let mut chars = base.chars();
            if let (Some(b), None) = (chars.next(), chars.next()) {
                if let Some(c) = compose(b, *mark) {
                    return Some(c.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winansi_round_trip() {
        for c in ['A', 'z', ' ', 'é', '€', '—', '“'] {
            let code = char_to_winansi(c).unwrap();
            assert_eq!(winansi_to_char(code), Some(c));
        }
        assert_eq!(char_to_winansi('漢'), None);
        assert_eq!(winansi_to_char(0x81), None);
    }

    #[test]
    fn test_macroman_and_standard() {
        assert_eq!(macroman_to_char(0x8E), Some('é'));
        assert_eq!(macroman_to_char(0xD2), Some('“'));
        assert_eq!(standard_to_char(0x27), Some('’'));
        assert_eq!(standard_to_char(0xAE), Some('ﬁ'));
        assert_eq!(BaseEncoding::from_name(b"MacRomanEncoding"), Some(BaseEncoding::MacRoman));
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_string("A").as_deref(), Some("A"));
        assert_eq!(glyph_name_to_string("space").as_deref(), Some(" "));
        assert_eq!(glyph_name_to_string("uni20AC").as_deref(), Some("€"));
        assert_eq!(glyph_name_to_string("u1F600").as_deref(), Some("😀"));
        assert_eq!(glyph_name_to_string("eacute").as_deref(), Some("é"));
        assert_eq!(glyph_name_to_string("Udieresis").as_deref(), Some("Ü"));
        assert_eq!(glyph_name_to_string("fi").as_deref(), Some("fi"));
        assert_eq!(glyph_name_to_string("g123"), None);
    }
}
