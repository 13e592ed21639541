//! Font classifier
//!
//! Maps an arbitrary declared font to one of twelve canonical fonts that the
//! editor can always write without embedding anything: the Helvetica, Times
//! and Courier families of the standard 14, each in regular, bold, italic and
//! bold-italic.
//!
//! Classification never fails. Rules, in order:
//!
//! 1. Fixed-pitch flag or a monospace name hint gives mono.
//! 2. A sans name hint gives sans.
//! 3. A serif name hint or the serif flag gives serif.
//! 4. Anything else, including symbol fonts, is sans.

use std::fmt;

/// Font descriptor flag bits (PDF 32000-1, 9.8.2)
pub mod flags {
    pub const FIXED_PITCH: u32 = 1 << 0;
    pub const SERIF: u32 = 1 << 1;
    pub const ITALIC: u32 = 1 << 6;
    pub const FORCE_BOLD: u32 = 1 << 18;
}

const MONO_HINTS: &[&str] = &[
    "courier", "mono", "consolas", "lucidaconsole", "menlo", "monaco", "inconsolata",
    "sourcecode", "firacode", "typewriter", "fixedsys",
];

const SANS_HINTS: &[&str] = &[
    "sans", "helvetica", "arial", "calibri", "verdana", "tahoma", "trebuchet", "segoe",
    "tisa", "roboto", "lato", "futura", "frutiger", "univers", "myriad", "gill", "gothic",
    "avenir", "candara", "corbel", "franklin",
];

const SERIF_HINTS: &[&str] = &[
    "serif", "times", "roman", "cambria", "georgia", "garamond", "palatino", "bookman",
    "minion", "baskerville", "caslon", "didot", "bodoni", "century", "schoolbook",
    "charter", "libertine", "constantia", "tiro", "cmr",
];

const BOLD_HINTS: &[&str] = &["bold", "black", "heavy", "demi", "semibold", "extrabold"];

const ITALIC_HINTS: &[&str] = &["italic", "oblique", "slanted"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Sans,
    Serif,
    Mono,
}

/// One of the twelve fonts the editor writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalFont {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

impl CanonicalFont {
    pub const HELVETICA: CanonicalFont = CanonicalFont {
        family: FontFamily::Sans,
        bold: false,
        italic: false,
    };

    pub fn new(family: FontFamily, bold: bool, italic: bool) -> Self {
        Self { family, bold, italic }
    }

    /// Standard 14 `BaseFont` name.
    pub fn base_font(&self) -> &'static str {
        match (self.family, self.bold, self.italic) {
            (FontFamily::Sans, false, false) => "Helvetica",
            (FontFamily::Sans, true, false) => "Helvetica-Bold",
            (FontFamily::Sans, false, true) => "Helvetica-Oblique",
            (FontFamily::Sans, true, true) => "Helvetica-BoldOblique",
            (FontFamily::Serif, false, false) => "Times-Roman",
            (FontFamily::Serif, true, false) => "Times-Bold",
            (FontFamily::Serif, false, true) => "Times-Italic",
            (FontFamily::Serif, true, true) => "Times-BoldItalic",
            (FontFamily::Mono, false, false) => "Courier",
            (FontFamily::Mono, true, false) => "Courier-Bold",
            (FontFamily::Mono, false, true) => "Courier-Oblique",
            (FontFamily::Mono, true, true) => "Courier-BoldOblique",
        }
    }
}

impl fmt::Display for CanonicalFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_font())
    }
}

/// Remove a subset tag such as `ABCDEF+`.
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

/// Short font codes clients may send (`helv`, `tibo`, `cour`, ...).
fn from_short_code(code: &str) -> Option<CanonicalFont> {
    let (family, style) = code.split_at(code.len().min(2));
    let family = match family {
        "he" => FontFamily::Sans,
        "ti" => FontFamily::Serif,
        "co" => FontFamily::Mono,
        _ => return None,
    };
    let (bold, italic) = match (family, style) {
        (FontFamily::Sans, "lv") | (FontFamily::Serif, "ro") | (FontFamily::Mono, "ur") => (false, false),
        (_, "bo") => (true, false),
        (_, "it") => (false, true),
        (_, "bi") => (true, true),
        _ => return None,
    };
    Some(CanonicalFont::new(family, bold, italic))
}

/// Classify a declared font by name and descriptor flags.
pub fn classify(name: &str, font_flags: u32) -> CanonicalFont {
    let normalized: String = strip_subset_prefix(name)
        .chars()
        .filter(|c| !matches!(c, ' ' | '_'))
        .flat_map(char::to_lowercase)
        .collect();

    if normalized.len() == 4 && normalized.is_ascii() {
        if let Some(font) = from_short_code(&normalized) {
            return font;
        }
    }

    let has = |hints: &[&str]| hints.iter().any(|h| normalized.contains(h));

    let family = if font_flags & flags::FIXED_PITCH != 0 || has(MONO_HINTS) {
        FontFamily::Mono
    } else if has(SANS_HINTS) {
        FontFamily::Sans
    } else if has(SERIF_HINTS) || font_flags & flags::SERIF != 0 {
        FontFamily::Serif
    } else {
        FontFamily::Sans
    };

    let bold = font_flags & flags::FORCE_BOLD != 0 || has(BOLD_HINTS);
    let italic = font_flags & flags::ITALIC != 0 || has(ITALIC_HINTS) || has_italic_suffix(&normalized);

    CanonicalFont::new(family, bold, italic)
}

/// Style suffixes like `-It`, `,BoldIt`, `-LightIt`.
fn has_italic_suffix(normalized: &str) -> bool {
    normalized
        .rsplit(['-', ','])
        .next()
        .filter(|_| normalized.contains(['-', ',']))
        .map(|style| style.ends_with("it") && style.len() <= 12)
        .unwrap_or(false)
}
