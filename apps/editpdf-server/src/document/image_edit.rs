//! Image placement editing
//!
//! Images are moved and resized by rewriting the transformation in front of
//! their `Do` operation. The image XObject itself is never decoded or
//! re-encoded after it has been added.

use lopdf::content::Operation;
use lopdf::{dictionary, Object, Stream};

use super::content::{decode_page, encode_operations, matrix_op, matrix_operand, scan_page, ImageDraw, PageScan};
use super::error::{EditError, Result};
use super::geometry::{clamp_origin, Matrix, PageGeometry};
use super::model::{compressed_stream, PdfDocument};
use super::text_edit::isolate;
use super::types::{ImageBox, ImageDelete, ImageMove, ImageResize};

/// Width given to added images when the caller does not size them.
pub const DEFAULT_IMAGE_WIDTH: f64 = 200.0;
/// Margin kept to the right page edge when auto-sizing.
const IMAGE_PADDING: f64 = 10.0;

/// Add an image with its box top-left at `(x, y)`. Without an explicit
/// `size` the image is [auto-sized](auto_size) to the page.
pub fn add_image(
    doc: &mut PdfDocument,
    page: usize,
    data: &[u8],
    x: f64,
    y: f64,
    size: Option<(f64, f64)>,
) -> Result<()> {
    if data.is_empty() {
        return Err(EditError::InvalidImage("empty file".to_string()));
    }
    let decoded = image::load_from_memory(data)
        .map_err(|e| EditError::InvalidImage(format!("cannot decode image: {}", e)))?;
    let geometry = doc.geometry(page)?;

    let (width, height) = match size {
        Some(size) => size,
        None => auto_size(decoded.width(), decoded.height(), x, geometry.width()),
    };
    let requested = ImageBox::new(x, y, width, height);
    requested.validate()?;
    let placed = clamped(requested, &geometry);

    let xobject = image_xobject(doc, data, &decoded)?;
    let name = doc.add_resource(page, "XObject", "EIm", xobject)?;

    let mut operations = isolate(decode_page(doc, page)?);
    operations.extend([
        Operation::new("q", vec![]),
        matrix_op("cm", &placement_matrix(&placed, &geometry)),
        Operation::new("Do", vec![Object::Name(name)]),
        Operation::new("Q", vec![]),
    ]);
    doc.set_page_content(page, encode_operations(operations)?)?;

    tracing::debug!(
        page,
        x = placed.x,
        y = placed.y,
        width = placed.width,
        height = placed.height,
        pixels_w = decoded.width(),
        pixels_h = decoded.height(),
        "Image added"
    );
    Ok(())
}

/// Move an image, keeping its size and orientation.
pub fn move_image(doc: &mut PdfDocument, page: usize, request: &ImageMove) -> Result<()> {
    if !request.x.is_finite() || !request.y.is_finite() {
        return Err(EditError::InvalidGeometry(
            "coordinates must be finite numbers".to_string(),
        ));
    }
    let scan = scan_page(doc, page)?;
    let draw = find_image(&scan, request.image_index)?;
    let geometry = scan.geometry;

    let (x, y) = clamp_origin(
        request.x,
        request.y,
        draw.bbox.width(),
        draw.bbox.height(),
        geometry.width(),
        geometry.height(),
    );
    let shift = geometry
        .user_to_page()
        .then(&Matrix::translate(x - draw.bbox.x0, y - draw.bbox.y0))
        .then(&geometry.page_to_user());
    let target = draw.ctm.then(&shift);

    let operations = retransform(&scan.operations, draw, &target)?;
    doc.set_page_content(page, encode_operations(operations)?)?;

    tracing::debug!(page, index = request.image_index, x, y, "Image moved");
    Ok(())
}

/// Give an image a new box.
pub fn resize_image(doc: &mut PdfDocument, page: usize, request: &ImageResize) -> Result<()> {
    let requested = ImageBox::new(request.x, request.y, request.width, request.height);
    requested.validate()?;

    let scan = scan_page(doc, page)?;
    let draw = find_image(&scan, request.image_index)?;
    let placed = clamped(requested, &scan.geometry);
    let target = placement_matrix(&placed, &scan.geometry);

    let operations = retransform(&scan.operations, draw, &target)?;
    doc.set_page_content(page, encode_operations(operations)?)?;

    tracing::debug!(
        page,
        index = request.image_index,
        x = placed.x,
        y = placed.y,
        width = placed.width,
        height = placed.height,
        "Image resized"
    );
    Ok(())
}

/// Remove an image placement from the page.
pub fn delete_image(doc: &mut PdfDocument, page: usize, request: &ImageDelete) -> Result<()> {
    let scan = scan_page(doc, page)?;
    let draw = find_image(&scan, request.image_index)?;

    let i = draw.index;
    let range = if is_wrapped(&scan.operations, i) {
        i - 2..i + 2
    } else {
        i..i + 1
    };
    let mut operations = scan.operations.clone();
    operations.drain(range);
    doc.set_page_content(page, encode_operations(operations)?)?;

    tracing::debug!(page, index = request.image_index, "Image deleted");
    Ok(())
}

/// Box size for an image added without one: [`DEFAULT_IMAGE_WIDTH`] wide, or
/// the room left to the right of `x`, keeping the aspect ratio.
pub fn auto_size(pixel_width: u32, pixel_height: u32, x: f64, page_width: f64) -> (f64, f64) {
    let room = page_width - x - IMAGE_PADDING;
    let width = if room > 0.0 {
        DEFAULT_IMAGE_WIDTH.min(room)
    } else {
        DEFAULT_IMAGE_WIDTH.min(page_width)
    };
    let aspect = pixel_height.max(1) as f64 / pixel_width.max(1) as f64;
    (width, width * aspect)
}

fn find_image(scan: &PageScan, index: usize) -> Result<&ImageDraw> {
    scan.images
        .get(index)
        .ok_or_else(|| EditError::stale_image(index, scan.images.len()))
}

fn clamped(requested: ImageBox, geometry: &PageGeometry) -> ImageBox {
    let (x, y) = clamp_origin(
        requested.x,
        requested.y,
        requested.width,
        requested.height,
        geometry.width(),
        geometry.height(),
    );
    ImageBox { x, y, ..requested }
}

/// Map the image unit square onto a page-space box, image top at the top.
fn placement_matrix(placed: &ImageBox, geometry: &PageGeometry) -> Matrix {
    Matrix::new(
        placed.width,
        0.0,
        0.0,
        -placed.height,
        placed.x,
        placed.y + placed.height,
    )
    .then(&geometry.page_to_user())
}

/// `q <cm> <Do> Q` with the `Do` at `index`.
fn is_wrapped(operations: &[Operation], index: usize) -> bool {
    index >= 2
        && operations[index - 2].operator == "q"
        && operations[index - 1].operator == "cm"
        && operations.get(index + 1).map(|op| op.operator == "Q").unwrap_or(false)
}

/// Operations with the image at `draw` painted through `target` instead of
/// its current transformation.
fn retransform(operations: &[Operation], draw: &ImageDraw, target: &Matrix) -> Result<Vec<Operation>> {
    let singular = || EditError::Pdf("image transformation is not invertible".to_string());
    let i = draw.index;
    let mut out = operations.to_vec();

    if is_wrapped(operations, i) {
        if let Some(own) = matrix_operand(&operations[i - 1]) {
            // ctm = own x outer, so the replacement is target x outer^-1
            let outer = own.invert().ok_or_else(singular)?.then(&draw.ctm);
            let replacement = target.then(&outer.invert().ok_or_else(singular)?);
            out[i - 1] = matrix_op("cm", &replacement);
            return Ok(out);
        }
    }

    let adjust = target.then(&draw.ctm.invert().ok_or_else(singular)?);
    out.splice(
        i..i + 1,
        [
            Operation::new("q", vec![]),
            matrix_op("cm", &adjust),
            operations[i].clone(),
            Operation::new("Q", vec![]),
        ],
    );
    Ok(out)
}

/// Store `data` as an image XObject and return its object id.
fn image_xobject(doc: &mut PdfDocument, data: &[u8], decoded: &image::DynamicImage) -> Result<lopdf::ObjectId> {
    let (width, height) = (decoded.width() as i64, decoded.height() as i64);

    if matches!(image::guess_format(data), Ok(image::ImageFormat::Jpeg)) {
        let color_space = match jpeg_components(data) {
            Some(1) => Some("DeviceGray"),
            Some(3) => Some("DeviceRGB"),
            _ => None,
        };
        if let Some(color_space) = color_space {
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            };
            return Ok(doc.add_object(Stream::new(dict, data.to_vec())));
        }
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    let mut alpha = Vec::with_capacity(rgba.len() / 4);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width,
        "Height" => height,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };
    if alpha.iter().any(|a| *a != u8::MAX) {
        let mask = compressed_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            &alpha,
        )?;
        let mask_id = doc.add_object(mask);
        dict.set("SMask", Object::Reference(mask_id));
    }
    Ok(doc.add_object(compressed_stream(dict, &rgb)?))
}

/// Component count from a JPEG's start-of-frame header.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            return data.get(pos + 9).copied();
        }
        pos += 2 + length;
    }
    None
}
