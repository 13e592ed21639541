//! Page rasterization seam
//!
//! The engine hands the current serialized document to a [`PageRasterizer`].
//! The MuPDF-backed implementation lives in [`crate::mupdf`]; builds without
//! it use [`NoRasterizer`].

use super::error::{EditError, Result};

/// Default render scale (pixels per point).
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;
pub const MIN_RENDER_SCALE: f32 = 0.1;
pub const MAX_RENDER_SCALE: f32 = 4.0;

/// Turns one page of a PDF into PNG bytes
pub trait PageRasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render page `page` (zero-based) of `pdf` at `scale` pixels per point.
    fn render_png(&self, pdf: &[u8], page: usize, scale: f32) -> Result<Vec<u8>>;
}

/// Rasterizer for builds without a rendering backend
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRasterizer;

impl PageRasterizer for NoRasterizer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn render_png(&self, _pdf: &[u8], _page: usize, _scale: f32) -> Result<Vec<u8>> {
        Err(EditError::RenderUnavailable)
    }
}

/// Clamp a requested scale into the supported range.
pub fn clamp_scale(scale: f32) -> f32 {
    if scale.is_finite() {
        scale.clamp(MIN_RENDER_SCALE, MAX_RENDER_SCALE)
    } else {
        DEFAULT_RENDER_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_scale() {
        assert_eq!(clamp_scale(2.0), 2.0);
        assert_eq!(clamp_scale(0.0), MIN_RENDER_SCALE);
        assert_eq!(clamp_scale(100.0), MAX_RENDER_SCALE);
        assert_eq!(clamp_scale(f32::NAN), DEFAULT_RENDER_SCALE);
    }

    #[test]
    fn test_no_rasterizer() {
        assert!(matches!(
            NoRasterizer.render_png(b"%PDF", 0, 1.0),
            Err(EditError::RenderUnavailable)
        ));
    }
}
