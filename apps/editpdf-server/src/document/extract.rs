//! Page element enumeration
//!
//! Indices are positions in a fresh scan of the page and are only meaningful
//! until the page is next mutated.

use super::content::scan_page;
use super::error::Result;
use super::geometry::round2;
use super::model::PdfDocument;
use super::types::{ImagePlacement, PageImages, PageText, TextSpan};

/// Enumerate the text spans of a page.
pub fn page_text(doc: &PdfDocument, page: usize) -> Result<PageText> {
    let scan = scan_page(doc, page)?;
    let spans = scan
        .spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            let font = if span.font.base_font.is_empty() {
                String::from_utf8_lossy(&span.font_resource).into_owned()
            } else {
                span.font.base_font.clone()
            };
            TextSpan {
                index,
                bbox: span.bbox.rounded().to_array(),
                text: span.text,
                font,
                normalized_font: span.font.canonical().base_font().to_string(),
                size: round2(span.size),
                color: span.color.to_hex(),
                flags: span.font.flags,
            }
        })
        .collect();

    Ok(PageText {
        page_num: page,
        width: round2(scan.geometry.width()),
        height: round2(scan.geometry.height()),
        spans,
    })
}

/// Enumerate the image placements of a page.
///
/// Each box is the full placement and may extend past the page edge; it is
/// the same box move and resize operate on.
pub fn page_images(doc: &PdfDocument, page: usize) -> Result<PageImages> {
    let scan = scan_page(doc, page)?;
    let images = scan
        .images
        .iter()
        .enumerate()
        .map(|(index, draw)| {
            let bbox = draw.bbox.rounded();
            ImagePlacement {
                index,
                bbox: bbox.to_array(),
                width: round2(bbox.width()),
                height: round2(bbox.height()),
            }
        })
        .collect();

    Ok(PageImages {
        page_num: page,
        width: round2(scan.geometry.width()),
        height: round2(scan.geometry.height()),
        images,
    })
}

#[cfg(test)]
mod tests {
    use super::super::image_edit::add_image;
    use super::super::model::fixtures::*;
    use super::*;

    #[test]
    fn test_page_text_report() {
        let doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let text = page_text(&doc, 0).unwrap();
        assert_eq!((text.page_num, text.width, text.height), (0, 612.0, 792.0));
        assert_eq!(text.spans.len(), 2);

        let world = &text.spans[1];
        assert_eq!(world.index, 1);
        assert_eq!(world.text, "World");
        assert_eq!(world.font, "Times-Roman");
        assert_eq!(world.normalized_font, "Times-Roman");
        assert_eq!(world.size, 12.0);
        assert_eq!(world.color, "#000000");
        let [x0, y0, x1, y1] = world.bbox;
        assert!(x0 >= 0.0 && y0 >= 0.0 && x1 > x0 && y1 > y0);
    }

    #[test]
    fn test_reads_are_idempotent() {
        let doc = PdfDocument::load(&two_page_pdf()).unwrap();
        assert_eq!(page_text(&doc, 0).unwrap(), page_text(&doc, 0).unwrap());
        assert_eq!(page_images(&doc, 0).unwrap(), page_images(&doc, 0).unwrap());
    }

    #[test]
    fn test_page_images_report() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        assert!(page_images(&doc, 0).unwrap().images.is_empty());

        add_image(&mut doc, 0, &png_bytes(3, 3), 10.0, 10.0, Some((90.0, 40.0))).unwrap();
        let images = page_images(&doc, 0).unwrap();
        assert_eq!(images.images.len(), 1);
        assert_eq!(images.images[0].bbox, [10.0, 10.0, 100.0, 50.0]);
        assert_eq!((images.images[0].width, images.images[0].height), (90.0, 40.0));
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = PdfDocument::load(&two_page_pdf()).unwrap();
        assert!(matches!(
            page_text(&doc, 7),
            Err(crate::document::EditError::PageOutOfRange { page: 7, count: 2 })
        ));
    }
}
