//! MuPDF page rasterizer
//!
//! MuPDF's `fz_context` is not thread-safe, so every render opens a fresh
//! document from the serialized bytes on the calling (blocking) thread.

use std::io::Cursor;

use ::mupdf::{Colorspace, Document, Matrix, Pixmap};

use crate::document::{clamp_scale, EditError, PageRasterizer, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfRasterizer;

impl PageRasterizer for MupdfRasterizer {
    fn name(&self) -> &'static str {
        "mupdf"
    }

    fn render_png(&self, pdf: &[u8], page: usize, scale: f32) -> Result<Vec<u8>> {
        let doc = Document::from_bytes(pdf, "application/pdf")?;
        let count = doc.page_count()?.max(0) as usize;
        if page >= count {
            return Err(EditError::PageOutOfRange { page, count });
        }
        let page = doc.load_page(page as i32)?;

        let scale = clamp_scale(scale);
        let matrix = Matrix::new_scale(scale, scale);

        // Opaque white background; edited pages are composited by the client.
        let colorspace = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;

        encode_png(&pixmap)
    }
}

/// Encode a pixmap of any component count as RGBA PNG
fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let (g, b) = if n >= 3 {
                (
                    samples.get(offset + 1).copied().unwrap_or(0),
                    samples.get(offset + 2).copied().unwrap_or(0),
                )
            } else {
                (r, r)
            };
            let a = if n == 4 || n == 2 {
                samples.get(offset + n - 1).copied().unwrap_or(255)
            } else {
                255
            };
            rgba.extend_from_slice(&[r, g, b, a]);
        }
    }

    let img = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| EditError::Render("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| EditError::Render(e.to_string()))?;
    Ok(output)
}
