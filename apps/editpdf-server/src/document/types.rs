//! Edit engine data types
//!
//! Values exchanged between the engine and its callers. All coordinates are
//! page space (see [`super::geometry`]).

use serde::{Deserialize, Serialize};

use super::error::{EditError, Result};

/// Largest accepted font size in points.
pub const MAX_FONT_SIZE: f64 = 1000.0;

/// Default size for newly added text.
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

/// Leading between lines of multi-line text, as a multiple of the size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.3;

// ============================================================================
// Colors
// ============================================================================

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn parse_hex(value: &str) -> Result<Self> {
        let hex = value.trim().strip_prefix('#').unwrap_or(value.trim());
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EditError::InvalidColor(format!(
                "'{}' is not a #rrggbb color",
                value
            )));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| EditError::InvalidColor(value.to_string()))
        };
        Ok(Rgb {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }

    /// Build from PDF color components in `0.0..=1.0`.
    pub fn from_unit(components: [f64; 3]) -> Self {
        let to_byte = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgb {
            r: to_byte(components[0]),
            g: to_byte(components[1]),
            b: to_byte(components[2]),
        }
    }

    pub fn to_unit(self) -> [f64; 3] {
        [
            self.r as f64 / 255.0,
            self.g as f64 / 255.0,
            self.b as f64 / 255.0,
        ]
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Validate a font size for text written by the engine.
pub fn validate_size(size: f64) -> Result<f64> {
    if !size.is_finite() || size <= 0.0 || size > MAX_FONT_SIZE {
        return Err(EditError::InvalidSize(format!(
            "font size must be greater than 0 and at most {}, got {}",
            MAX_FONT_SIZE, size
        )));
    }
    Ok(size)
}

// ============================================================================
// Enumerated page elements
// ============================================================================

/// A text run on a page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpan {
    /// Position in this page's current enumeration
    pub index: usize,
    /// `[x0, y0, x1, y1]` in page space
    pub bbox: [f64; 4],
    pub text: String,
    /// Declared font name, subset prefix removed
    pub font: String,
    /// Standard 14 font used when this span is rewritten
    pub normalized_font: String,
    pub size: f64,
    /// `#rrggbb`
    pub color: String,
    /// Font descriptor flags, 0 when the font has no descriptor
    pub flags: u32,
}

/// An image painted on a page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlacement {
    pub index: usize,
    pub bbox: [f64; 4],
    pub width: f64,
    pub height: f64,
}

/// Text enumeration for one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    pub page_num: usize,
    pub width: f64,
    pub height: f64,
    pub spans: Vec<TextSpan>,
}

/// Image enumeration for one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImages {
    pub page_num: usize,
    pub width: f64,
    pub height: f64,
    pub images: Vec<ImagePlacement>,
}

// ============================================================================
// Mutation requests
// ============================================================================

/// Replace or delete one text span
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanEdit {
    #[serde(alias = "span_index")]
    pub span_index: usize,
    /// Required; an empty string deletes the span
    #[serde(alias = "new_text")]
    pub new_text: String,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Add a new run of text with its box top-left at `(x, y)`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInsert {
    pub x: f64,
    pub y: f64,
    pub text: String,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Target box for placing or resizing an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ImageBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Reject non-finite values and non-positive dimensions.
    pub fn validate(&self) -> Result<()> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(EditError::InvalidGeometry(
                "coordinates must be finite numbers".to_string(),
            ));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(EditError::InvalidGeometry(format!(
                "width and height must be positive, got {} x {}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Move an existing image so its box starts at `(x, y)`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMove {
    #[serde(alias = "image_index")]
    pub image_index: usize,
    pub x: f64,
    pub y: f64,
}

/// Replace an existing image's box
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResize {
    #[serde(alias = "image_index")]
    pub image_index: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Remove an existing image
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDelete {
    #[serde(alias = "image_index")]
    pub image_index: usize,
}

// ============================================================================
// Session reporting
// ============================================================================

/// Result of opening a document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: String,
    pub page_count: usize,
}

/// Snapshot of a session's state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub page_count: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub undo_depth: usize,
    pub redo_depth: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_accessed: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(Rgb::parse_hex("#ff8000").unwrap(), Rgb { r: 255, g: 128, b: 0 });
        assert_eq!(Rgb::parse_hex("00ff00").unwrap(), Rgb { r: 0, g: 255, b: 0 });
        assert!(matches!(Rgb::parse_hex("#fff"), Err(EditError::InvalidColor(_))));
        assert!(matches!(Rgb::parse_hex("#gg0000"), Err(EditError::InvalidColor(_))));
        assert!(matches!(Rgb::parse_hex("#ffé000"), Err(EditError::InvalidColor(_))));
    }

    #[test]
    fn test_unit_conversion() {
        let c = Rgb::from_unit([1.0, 0.5, 0.0]);
        assert_eq!(c.to_hex(), "#ff8000");
        assert_eq!(Rgb::from_unit([2.0, -1.0, 0.0]).to_hex(), "#ff0000");
    }

    #[test]
    fn test_validate_size() {
        assert_eq!(validate_size(12.0).unwrap(), 12.0);
        assert!(matches!(validate_size(0.0), Err(EditError::InvalidSize(_))));
        assert!(matches!(validate_size(-3.0), Err(EditError::InvalidSize(_))));
        assert!(matches!(validate_size(f64::NAN), Err(EditError::InvalidSize(_))));
        assert!(matches!(validate_size(5000.0), Err(EditError::InvalidSize(_))));
    }

    #[test]
    fn test_image_box_validation() {
        assert!(ImageBox::new(0.0, 0.0, 10.0, 10.0).validate().is_ok());
        assert!(matches!(
            ImageBox::new(0.0, 0.0, 0.0, 10.0).validate(),
            Err(EditError::InvalidGeometry(_))
        ));
        assert!(matches!(
            ImageBox::new(f64::INFINITY, 0.0, 10.0, 10.0).validate(),
            Err(EditError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_span_edit_accepts_snake_case() {
        let edit: SpanEdit =
            serde_json::from_str(r#"{"span_index": 2, "new_text": "x", "size": 10}"#).unwrap();
        assert_eq!(edit.span_index, 2);
        assert_eq!(edit.new_text, "x");
        assert_eq!(edit.size, Some(10.0));

        let edit: SpanEdit = serde_json::from_str(r#"{"spanIndex": 0, "newText": ""}"#).unwrap();
        assert_eq!(edit.span_index, 0);
        assert!(edit.new_text.is_empty());
    }

    #[test]
    fn test_span_edit_requires_new_text() {
        let result = serde_json::from_str::<SpanEdit>(r#"{"spanIndex": 0, "size": 30}"#);
        assert!(result.is_err());
    }
}
