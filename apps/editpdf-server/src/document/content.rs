//! Content stream interpreter
//!
//! Walks a page's decoded operations once, tracking the graphics and text
//! state, and records where text is shown and where images are painted.
//! Both the extractor and the editors work from the same [`PageScan`], so an
//! index handed out by an enumeration always refers to the same element the
//! editors resolve it to.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::Object;

use super::error::{EditError, Result};
use super::fonts::FontInfo;
use super::geometry::{Matrix, PageGeometry, Rect};
use super::model::{number, PdfDocument};
use super::types::Rgb;

/// Gap between shows, in ems, beyond which they belong to separate runs.
const MAX_RUN_GAP_EM: f64 = 1.5;
/// Gap, in ems, that is rendered as a space in extracted text.
const SPACE_GAP_EM: f64 = 0.15;
/// TJ adjustment (thousandths of an em) treated as a word break.
const TJ_SPACE_THRESHOLD: f64 = -200.0;

/// One text-showing operation belonging to a run
#[derive(Debug, Clone)]
pub struct ShowOp {
    /// Index into [`PageScan::operations`]
    pub index: usize,
    /// Horizontal displacement of the operation in text space
    pub advance: f64,
    pub font_size: f64,
    pub horizontal_scale: f64,
}

/// A run of text with uniform font, size and color on one baseline
#[derive(Debug, Clone)]
pub struct TextRun {
    pub shows: Vec<ShowOp>,
    pub text: String,
    pub font_resource: Vec<u8>,
    pub font: Arc<FontInfo>,
    /// Effective size in points
    pub size: f64,
    pub color: Rgb,
    /// Page-space box clamped to the page
    pub bbox: Rect,
    /// Page-space start of the baseline
    pub origin: (f64, f64),
}

/// An image XObject painted by `Do`
#[derive(Debug, Clone)]
pub struct ImageDraw {
    /// Index of the `Do` operation
    pub index: usize,
    pub name: Vec<u8>,
    /// Image space (unit square) to user space
    pub ctm: Matrix,
    /// Full page-space box, possibly extending past the page
    pub bbox: Rect,
}

/// Everything the editors need to know about one page
#[derive(Debug, Clone)]
pub struct PageScan {
    pub geometry: PageGeometry,
    pub operations: Vec<Operation>,
    pub spans: Vec<TextRun>,
    pub images: Vec<ImageDraw>,
}

/// Decode a page's content into operations.
pub fn decode_page(doc: &PdfDocument, page: usize) -> Result<Vec<Operation>> {
    let data = doc.page_content(page)?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Content::decode(&data)
        .map(|content| content.operations)
        .map_err(|e| EditError::Pdf(format!("cannot parse content of page {}: {}", page, e)))
}

/// Encode operations back into a content stream.
pub fn encode_operations(operations: Vec<Operation>) -> Result<Vec<u8>> {
    Content { operations }
        .encode()
        .map_err(|e| EditError::Pdf(format!("cannot encode content: {}", e)))
}

/// Interpret a page's content.
pub fn scan_page(doc: &PdfDocument, page: usize) -> Result<PageScan> {
    let geometry = doc.geometry(page)?;
    let operations = decode_page(doc, page)?;
    let mut interpreter = Interpreter::new(doc, page, geometry);
    for (index, op) in operations.iter().enumerate() {
        interpreter.step(index, op)?;
    }
    interpreter.finish_run();
    Ok(PageScan {
        geometry,
        operations,
        spans: interpreter.spans,
        images: interpreter.images,
    })
}

/// Numeric operands of an operation, skipping anything else.
pub fn numbers(op: &Operation) -> Vec<f64> {
    op.operands.iter().filter_map(number).collect()
}

/// Matrix from six numeric operands (`cm`, `Tm`).
pub fn matrix_operand(op: &Operation) -> Option<Matrix> {
    match numbers(op).as_slice() {
        [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}

/// Build an operation from a matrix.
pub fn matrix_op(operator: &str, m: &Matrix) -> Operation {
    Operation::new(
        operator,
        m.to_array().iter().map(|v| real(*v)).collect(),
    )
}

/// PDF real with the noise below 1e-4 removed.
pub fn real(v: f64) -> Object {
    Object::Real(((v * 10000.0).round() / 10000.0) as f32)
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: [f64; 3],
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    font: Option<(Vec<u8>, Arc<FontInfo>)>,
    font_size: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: [0.0; 3],
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug)]
struct RunBuilder {
    shows: Vec<ShowOp>,
    text: String,
    font_resource: Vec<u8>,
    font: Arc<FontInfo>,
    font_size: f64,
    fill: [f64; 3],
    /// Text rendering matrix (without font size) at the start of the run
    start: Matrix,
    /// Distance from the start along the baseline, in text space
    end_x: f64,
    bbox: Rect,
}

struct Interpreter<'a> {
    doc: &'a PdfDocument,
    page: usize,
    geometry: PageGeometry,
    to_page: Matrix,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    fonts: HashMap<Vec<u8>, Arc<FontInfo>>,
    current: Option<RunBuilder>,
    spans: Vec<TextRun>,
    images: Vec<ImageDraw>,
}

impl<'a> Interpreter<'a> {
    fn new(doc: &'a PdfDocument, page: usize, geometry: PageGeometry) -> Self {
        Self {
            doc,
            page,
            geometry,
            to_page: geometry.user_to_page(),
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            fonts: HashMap::new(),
            current: None,
            spans: Vec::new(),
            images: Vec::new(),
        }
    }

    fn step(&mut self, index: usize, op: &Operation) -> Result<()> {
        let nums = numbers(op);
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(op) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }

            // Fill color
            "g" => {
                if let [gray] = nums.as_slice() {
                    self.state.fill = [*gray; 3];
                }
            }
            "rg" => {
                if let [r, g, b] = nums.as_slice() {
                    self.state.fill = [*r, *g, *b];
                }
            }
            "k" => {
                if let [c, m, y, k] = nums.as_slice() {
                    self.state.fill = cmyk_to_rgb(*c, *m, *y, *k);
                }
            }
            "sc" | "scn" => match nums.as_slice() {
                [gray] => self.state.fill = [*gray; 3],
                [r, g, b] => self.state.fill = [*r, *g, *b],
                [c, m, y, k] => self.state.fill = cmyk_to_rgb(*c, *m, *y, *k),
                _ => {}
            },
            "cs" => self.state.fill = [0.0; 3],

            // Text object
            "BT" => {
                self.finish_run();
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "ET" => self.finish_run(),

            // Text state
            "Tc" => set_first(&nums, &mut self.state.char_spacing),
            "Tw" => set_first(&nums, &mut self.state.word_spacing),
            "Tz" => {
                if let Some(scale) = nums.first() {
                    self.state.horizontal_scale = scale / 100.0;
                }
            }
            "TL" => set_first(&nums, &mut self.state.leading),
            "Ts" => set_first(&nums, &mut self.state.rise),
            "Tf" => {
                let name = op.operands.first().and_then(|o| o.as_name().ok());
                if let (Some(name), Some(size)) = (name, nums.last()) {
                    let font = self.load_font(name)?;
                    self.state.font = Some((name.to_vec(), font));
                    self.state.font_size = *size;
                }
            }

            // Text positioning
            "Td" => {
                if let [tx, ty] = nums.as_slice() {
                    self.move_line(*tx, *ty);
                }
            }
            "TD" => {
                if let [tx, ty] = nums.as_slice() {
                    self.state.leading = -ty;
                    self.move_line(*tx, *ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operand(op) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),

            // Text showing
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(index, &[TjItem::Text(bytes)]);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(index, &[TjItem::Text(bytes)]);
                }
            }
            "\"" => {
                if let [aw, ac, ..] = nums.as_slice() {
                    self.state.word_spacing = *aw;
                    self.state.char_spacing = *ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show(index, &[TjItem::Text(bytes)]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let items: Vec<TjItem<'_>> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(TjItem::Text(bytes)),
                            other => number(other).map(TjItem::Adjust),
                        })
                        .collect();
                    self.show(index, &items);
                }
            }

            "Do" => {
                if let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) {
                    self.paint_xobject(index, name)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn load_font(&mut self, name: &[u8]) -> Result<Arc<FontInfo>> {
        if let Some(font) = self.fonts.get(name) {
            return Ok(font.clone());
        }
        let font = match self.doc.resource(self.page, b"Font", name)? {
            Some(Object::Dictionary(dict)) => FontInfo::load(self.doc, dict),
            _ => {
                tracing::debug!(
                    page = self.page,
                    font = %String::from_utf8_lossy(name),
                    "Font resource missing, using fallback metrics"
                );
                FontInfo::fallback()
            }
        };
        let font = Arc::new(font);
        self.fonts.insert(name.to_vec(), font.clone());
        Ok(font)
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn show(&mut self, index: usize, items: &[TjItem<'_>]) {
        let Some((font_resource, font)) = self.state.font.clone() else {
            return;
        };
        let size = self.state.font_size;
        let th = self.state.horizontal_scale;

        // Glyph-free shows only move the pen
        if !items.iter().any(|item| matches!(item, TjItem::Text(bytes) if !bytes.is_empty())) {
            let advance: f64 = items
                .iter()
                .map(|item| match item {
                    TjItem::Adjust(amount) => -amount / 1000.0 * size * th,
                    TjItem::Text(_) => 0.0,
                })
                .sum();
            self.text_matrix = Matrix::translate(advance, 0.0).then(&self.text_matrix);
            return;
        }

        let rendering = self.text_matrix.then(&self.state.ctm);

        let continues = self.continues_run(&font_resource, &rendering);
        if !continues {
            self.finish_run();
        }
        let run = self.current.get_or_insert_with(|| RunBuilder {
            shows: Vec::new(),
            text: String::new(),
            font_resource: font_resource.clone(),
            font: font.clone(),
            font_size: size,
            fill: self.state.fill,
            start: rendering,
            end_x: 0.0,
            bbox: Rect::new(0.0, 0.0, 0.0, 0.0),
        });

        let offset = run
            .start
            .invert()
            .map(|inv| {
                let (ux, uy) = rendering.apply(0.0, 0.0);
                inv.apply(ux, uy).0
            })
            .unwrap_or(run.end_x);
        let gap = offset - run.end_x;
        if !run.shows.is_empty() && gap > SPACE_GAP_EM * size.abs() && !ends_with_space(&run.text) {
            run.text.push(' ');
        }

        let mut advance = 0.0;
        for item in items {
            match item {
                TjItem::Text(bytes) => {
                    for glyph in font.decode(bytes) {
                        let spacing = self.state.char_spacing
                            + if glyph.is_space { self.state.word_spacing } else { 0.0 };
                        advance += (glyph.width * size + spacing) * th;
                        run.text.push_str(&glyph.text);
                    }
                }
                TjItem::Adjust(amount) => {
                    advance -= amount / 1000.0 * size * th;
                    if *amount < TJ_SPACE_THRESHOLD && !run.text.is_empty() && !ends_with_space(&run.text) {
                        run.text.push(' ');
                    }
                }
            }
        }

        let rise = self.state.rise;
        let extent = Rect::new(
            0.0,
            font.descent * size + rise,
            advance,
            font.ascent * size + rise,
        );
        let op_box = extent.transform(&rendering.then(&self.to_page));
        run.bbox = if run.shows.is_empty() {
            op_box
        } else {
            run.bbox.union(&op_box)
        };
        run.end_x = offset + advance;
        run.shows.push(ShowOp {
            index,
            advance,
            font_size: size,
            horizontal_scale: th,
        });

        self.text_matrix = Matrix::translate(advance, 0.0).then(&self.text_matrix);
    }

    /// Whether a show at `rendering` extends the run in progress.
    fn continues_run(&self, font_resource: &[u8], rendering: &Matrix) -> bool {
        let Some(run) = &self.current else {
            return false;
        };
        let size = self.state.font_size;
        if run.font_resource != font_resource
            || (run.font_size - size).abs() > 1e-6
            || run.fill != self.state.fill
            || !run.start.same_orientation(rendering)
        {
            return false;
        }
        let Some(inverse) = run.start.invert() else {
            return false;
        };
        let (ux, uy) = rendering.apply(0.0, 0.0);
        let (x, y) = inverse.apply(ux, uy);
        let em = size.abs().max(1e-6);
        let gap = x - run.end_x;
        y.abs() <= 0.1 * em && gap >= -0.5 * em && gap <= MAX_RUN_GAP_EM * em
    }

    fn finish_run(&mut self) {
        let Some(run) = self.current.take() else {
            return;
        };
        if run.text.trim().is_empty() {
            return;
        }
        let Some(bbox) = run.bbox.clamp_to(self.geometry.width(), self.geometry.height()) else {
            return;
        };
        let origin = {
            let (ux, uy) = run.start.apply(0.0, 0.0);
            self.to_page.apply(ux, uy)
        };
        let size = run.font_size.abs() * run.start.vertical_scale();
        self.spans.push(TextRun {
            shows: run.shows,
            text: run.text,
            font_resource: run.font_resource,
            font: run.font,
            size,
            color: Rgb::from_unit(run.fill),
            bbox,
            origin,
        });
    }

    fn paint_xobject(&mut self, index: usize, name: &[u8]) -> Result<()> {
        let is_image = match self.doc.resource(self.page, b"XObject", name)? {
            Some(Object::Stream(stream)) => stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|s| s == b"Image")
                .unwrap_or(false),
            _ => false,
        };
        if !is_image {
            return Ok(());
        }
        let ctm = self.state.ctm;
        if ctm.determinant().abs() < 1e-9 {
            return Ok(());
        }
        let bbox = Rect::new(0.0, 0.0, 1.0, 1.0).transform(&ctm.then(&self.to_page));
        // Placements entirely off the page are not listed.
        if bbox.clamp_to(self.geometry.width(), self.geometry.height()).is_none() {
            return Ok(());
        }
        self.images.push(ImageDraw {
            index,
            name: name.to_vec(),
            ctm,
            bbox,
        });
        Ok(())
    }
}

enum TjItem<'b> {
    Text(&'b [u8]),
    Adjust(f64),
}

fn set_first(nums: &[f64], target: &mut f64) {
    if let Some(v) = nums.first() {
        *target = *v;
    }
}

fn ends_with_space(text: &str) -> bool {
    text.chars().last().map(char::is_whitespace).unwrap_or(false)
}

fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> [f64; 3] {
    [
        (1.0 - c) * (1.0 - k),
        (1.0 - m) * (1.0 - k),
        (1.0 - y) * (1.0 - k),
    ]
}

#[cfg(test)]
mod tests {
    use super::super::model::fixtures::*;
    use super::*;

    fn scan_content(content: &[u8]) -> PageScan {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        doc.set_page_content(0, content.to_vec()).unwrap();
        scan_page(&doc, 0).unwrap()
    }

    #[test]
    fn test_fixture_spans() {
        let doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let scan = scan_page(&doc, 0).unwrap();
        assert_eq!(scan.spans.len(), 2);

        let hello = &scan.spans[0];
        assert_eq!(hello.text, "Hello");
        assert_eq!(hello.font.base_font, "Helvetica");
        assert!((hello.size - 24.0).abs() < 1e-6);
        assert_eq!(hello.origin, (72.0, 92.0));
        // Helvetica "Hello" = 722 + 556 + 222 + 222 + 556
        assert!((hello.bbox.x1 - (72.0 + 2.278 * 24.0)).abs() < 1e-6);
        assert!((hello.bbox.y0 - (92.0 - 0.718 * 24.0)).abs() < 1e-6);

        assert_eq!(scan.spans[1].text, "World");
        assert_eq!(scan.spans[1].font.base_font, "Times-Roman");
    }

    #[test]
    fn test_shows_on_one_line_form_one_run() {
        let scan = scan_content(b"BT /F1 12 Tf 1 0 0 1 100 700 Tm (Hello) Tj [( wor) -20 (ld)] TJ ET");
        assert_eq!(scan.spans.len(), 1);
        assert_eq!(scan.spans[0].text, "Hello world");
        assert_eq!(scan.spans[0].shows.len(), 2);
    }

    #[test]
    fn test_tj_word_gap_inserts_space() {
        let scan = scan_content(b"BT /F1 12 Tf 100 700 Td [(Hello) -300 (there)] TJ ET");
        assert_eq!(scan.spans[0].text, "Hello there");
    }

    #[test]
    fn test_new_line_and_color_split_runs() {
        let scan = scan_content(
            b"BT /F1 12 Tf 14 TL 100 700 Td (one) Tj T* (two) Tj 1 0 0 rg (three) Tj ET",
        );
        let texts: Vec<&str> = scan.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(scan.spans[2].color.to_hex(), "#ff0000");
        assert!((scan.spans[1].origin.1 - (92.0 + 14.0)).abs() < 1e-6);
    }

    #[test]
    fn test_whitespace_and_offpage_runs_skipped() {
        let scan = scan_content(b"BT /F1 12 Tf 100 700 Td (   ) Tj ET BT /F1 12 Tf -500 700 Td (gone) Tj ET");
        assert!(scan.spans.is_empty());
    }

    #[test]
    fn test_ctm_scales_reported_size() {
        let scan = scan_content(b"q 2 0 0 2 0 0 cm BT /F1 10 Tf 50 300 Td (Big) Tj ET Q");
        assert_eq!(scan.spans.len(), 1);
        assert!((scan.spans[0].size - 20.0).abs() < 1e-6);
        assert_eq!(scan.spans[0].origin, (100.0, 192.0));
    }

    #[test]
    fn test_state_restored_after_q() {
        let scan = scan_content(b"q 0 0 1 rg Q BT /F1 12 Tf 100 700 Td (plain) Tj ET");
        assert_eq!(scan.spans[0].color.to_hex(), "#000000");
    }

    #[test]
    fn test_glyph_free_displacement_is_not_a_span() {
        let scan = scan_content(b"BT /F1 12 Tf 100 700 Td [-2000] TJ (after) Tj ET");
        assert_eq!(scan.spans.len(), 1);
        assert_eq!(scan.spans[0].text, "after");
        assert!((scan.spans[0].origin.0 - 124.0).abs() < 1e-6);
    }

    #[test]
    fn test_matrix_op_round_trip() {
        let m = Matrix::new(1.5, 0.0, 0.0, -2.0, 10.0, 20.25);
        assert_eq!(matrix_operand(&matrix_op("cm", &m)), Some(m));
    }
}
