//! Text span editing
//!
//! A span is removed by rewriting the operations that showed it into
//! glyph-free `TJ` displacements of the same width, so anything shown later
//! in the same text object stays where it was. Replacement text is written
//! as a new, self-contained text object appended to the page.

use lopdf::content::Operation;
use lopdf::{Dictionary, Object, StringFormat};

use super::classifier::{classify, CanonicalFont};
use super::content::{decode_page, encode_operations, matrix_op, real, scan_page, ShowOp, TextRun};
use super::encoding::char_to_winansi;
use super::error::{EditError, Result};
use super::fonts::StandardMetrics;
use super::geometry::{Matrix, PageGeometry};
use super::model::{standard_font, PdfDocument};
use super::types::{
    validate_size, Rgb, SpanEdit, TextInsert, DEFAULT_FONT_SIZE, LINE_HEIGHT_FACTOR, MAX_FONT_SIZE,
};

/// Smallest size used when a span reports a degenerate one.
const MIN_INHERITED_SIZE: f64 = 1.0;

/// Operators that cannot change state outside the group they appear in.
const CONTAINED_OPERATORS: &[&str] = &[
    "q", "Q", "BT", "ET", "Td", "TD", "Tm", "T*", "Tj", "TJ", "'", "m", "l", "c", "v", "y",
    "h", "re", "S", "s", "f", "F", "f*", "B", "B*", "b", "b*", "n", "Do", "sh", "MP", "DP",
    "BMC", "BDC", "EMC", "BX", "EX", "BI", "ID", "EI", "d0", "d1",
];

/// Resolved appearance of text written by the editor
#[derive(Debug, Clone, Copy)]
struct TextStyle {
    font: CanonicalFont,
    size: f64,
    color: Rgb,
}

/// Replace or delete one span.
pub fn edit_span(doc: &mut PdfDocument, page: usize, edit: &SpanEdit) -> Result<()> {
    let size = edit.size.map(validate_size).transpose()?;
    let color = edit.color.as_deref().map(Rgb::parse_hex).transpose()?;

    let scan = scan_page(doc, page)?;
    let span = scan
        .spans
        .get(edit.span_index)
        .ok_or_else(|| EditError::stale_span(edit.span_index, scan.spans.len()))?;

    let mut operations = redact(&scan.operations, span);

    if !edit.new_text.is_empty() {
        let style = TextStyle {
            font: edit
                .font
                .as_deref()
                .map(|name| classify(name, 0))
                .unwrap_or_else(|| span.font.canonical()),
            size: size.unwrap_or_else(|| span.size.clamp(MIN_INHERITED_SIZE, MAX_FONT_SIZE)),
            color: color.unwrap_or(span.color),
        };
        let block = text_block(doc, page, &scan.geometry, span.origin, &edit.new_text, &style)?;
        operations = isolate(operations);
        operations.extend(block);
    }

    doc.set_page_content(page, encode_operations(operations)?)?;

    tracing::debug!(
        page,
        index = edit.span_index,
        old_text = %span.text,
        deleted = edit.new_text.is_empty(),
        "Span rewritten"
    );
    Ok(())
}

/// Add a new run of text whose box starts at `(x, y)`.
pub fn add_text(doc: &mut PdfDocument, page: usize, insert: &TextInsert) -> Result<()> {
    if insert.text.trim().is_empty() {
        return Err(EditError::EmptyText);
    }
    if !insert.x.is_finite() || !insert.y.is_finite() {
        return Err(EditError::InvalidGeometry(
            "coordinates must be finite numbers".to_string(),
        ));
    }
    let style = TextStyle {
        font: insert
            .font
            .as_deref()
            .map(|name| classify(name, 0))
            .unwrap_or(CanonicalFont::HELVETICA),
        size: insert.size.map(validate_size).transpose()?.unwrap_or(DEFAULT_FONT_SIZE),
        color: insert
            .color
            .as_deref()
            .map(Rgb::parse_hex)
            .transpose()?
            .unwrap_or(Rgb::BLACK),
    };

    let geometry = doc.geometry(page)?;
    let mut operations = isolate(decode_page(doc, page)?);
    // (x, y) is the top of the box; text is positioned by its baseline
    let baseline = insert.y + StandardMetrics::for_canonical(style.font).ascent * style.size;
    let block = text_block(doc, page, &geometry, (insert.x, baseline), &insert.text, &style)?;
    operations.extend(block);
    doc.set_page_content(page, encode_operations(operations)?)?;

    tracing::debug!(page, x = insert.x, y = insert.y, font = %style.font, "Text added");
    Ok(())
}

/// Rewrite every operation of `span` into a displacement without glyphs.
fn redact(operations: &[Operation], span: &TextRun) -> Vec<Operation> {
    let mut out = Vec::with_capacity(operations.len() + span.shows.len() * 3);
    let mut shows = span.shows.iter().peekable();
    for (index, op) in operations.iter().enumerate() {
        match shows.peek() {
            Some(show) if show.index == index => {
                out.extend(displacement(op, show));
                shows.next();
            }
            _ => out.push(op.clone()),
        }
    }
    out
}

/// Glyph-free replacement for one text-showing operation.
fn displacement(op: &Operation, show: &ShowOp) -> Vec<Operation> {
    let unit = show.font_size * show.horizontal_scale;
    let amount = if unit.abs() > f64::EPSILON {
        -show.advance * 1000.0 / unit
    } else {
        0.0
    };
    let tj = Operation::new("TJ", vec![Object::Array(vec![real(amount)])]);
    match op.operator.as_str() {
        "'" => vec![Operation::new("T*", vec![]), tj],
        "\"" => {
            let mut ops = Vec::with_capacity(4);
            if let [aw, ac, ..] = op.operands.as_slice() {
                ops.push(Operation::new("Tw", vec![aw.clone()]));
                ops.push(Operation::new("Tc", vec![ac.clone()]));
            }
            ops.push(Operation::new("T*", vec![]));
            ops.push(tj);
            ops
        }
        _ => vec![tj],
    }
}

/// Make `operations` safe to append to: balanced `q`/`Q`, closed text
/// objects, and no graphics state escaping into what follows.
pub fn isolate(operations: Vec<Operation>) -> Vec<Operation> {
    let mut depth = 0usize;
    let mut in_text = false;
    let mut leaks = false;
    let mut balanced = Vec::with_capacity(operations.len() + 2);

    for op in operations {
        match op.operator.as_str() {
            "q" => depth += 1,
            "Q" => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
            }
            "BT" => in_text = true,
            "ET" => in_text = false,
            other => {
                if depth == 0 && !CONTAINED_OPERATORS.contains(&other) {
                    leaks = true;
                }
            }
        }
        balanced.push(op);
    }

    if in_text {
        balanced.push(Operation::new("ET", vec![]));
    }
    if depth > 0 {
        leaks = true;
        balanced.extend((0..depth).map(|_| Operation::new("Q", vec![])));
    }
    if !leaks || balanced.is_empty() {
        return balanced;
    }

    let mut wrapped = Vec::with_capacity(balanced.len() + 2);
    wrapped.push(Operation::new("q", vec![]));
    wrapped.extend(balanced);
    wrapped.push(Operation::new("Q", vec![]));
    wrapped
}

/// Self-contained text object drawing `text` with its first baseline
/// starting at the page-space point `origin`.
fn text_block(
    doc: &mut PdfDocument,
    page: usize,
    geometry: &PageGeometry,
    origin: (f64, f64),
    text: &str,
    style: &TextStyle,
) -> Result<Vec<Operation>> {
    let font_name = ensure_font(doc, page, style.font)?;
    let lines = encode_lines(text);
    let [r, g, b] = style.color.to_unit();
    // Text space y grows up, page space y grows down
    let placement = Matrix::new(1.0, 0.0, 0.0, -1.0, origin.0, origin.1).then(&geometry.page_to_user());

    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font_name), real(style.size)]),
        Operation::new("rg", vec![real(r), real(g), real(b)]),
    ];
    if lines.len() > 1 {
        ops.push(Operation::new("TL", vec![real(style.size * LINE_HEIGHT_FACTOR)]));
    }
    ops.push(matrix_op("Tm", &placement));
    for (i, line) in lines.into_iter().enumerate() {
        let operator = if i == 0 { "Tj" } else { "'" };
        ops.push(Operation::new(
            operator,
            vec![Object::String(line, StringFormat::Hexadecimal)],
        ));
    }
    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
    Ok(ops)
}

/// WinAnsi bytes for each line of `text`.
fn encode_lines(text: &str) -> Vec<Vec<u8>> {
    let mut replaced = 0usize;
    let lines = text
        .split('\n')
        .map(|line| {
            line.chars()
                .filter(|c| *c != '\r')
                .map(|c| {
                    let c = if c == '\t' { ' ' } else { c };
                    char_to_winansi(c).unwrap_or_else(|| {
                        replaced += 1;
                        b'?'
                    })
                })
                .collect()
        })
        .collect();
    if replaced > 0 {
        tracing::warn!(replaced, "Characters outside WinAnsi replaced with '?'");
    }
    lines
}

/// Name of a page font resource for `font`, adding one when the page has no
/// plain standard 14 entry for it.
fn ensure_font(doc: &mut PdfDocument, page: usize, font: CanonicalFont) -> Result<Vec<u8>> {
    let base_font = font.base_font();
    if let Some(entries) = doc.resources(page)?.and_then(|r| doc.get_dict(r, b"Font")) {
        let existing = entries.iter().find(|(_, obj)| {
            doc.resolve(obj)
                .as_dict()
                .map(|dict| is_plain_standard(dict, base_font))
                .unwrap_or(false)
        });
        if let Some((name, _)) = existing {
            return Ok(name.clone());
        }
    }
    let font_id = doc.add_object(standard_font(base_font));
    doc.add_resource(page, "Font", "EF", font_id)
}

/// Unembedded standard font with WinAnsi encoding and builtin metrics.
fn is_plain_standard(dict: &Dictionary, base_font: &str) -> bool {
    let name_is = |key: &[u8], expected: &[u8]| {
        dict.get(key)
            .and_then(Object::as_name)
            .map(|n| n == expected)
            .unwrap_or(false)
    };
    name_is(b"Subtype", b"Type1")
        && name_is(b"BaseFont", base_font.as_bytes())
        && name_is(b"Encoding", b"WinAnsiEncoding")
        && !dict.has(b"FontDescriptor")
        && !dict.has(b"Widths")
}

#[cfg(test)]
mod tests {
    use super::super::model::fixtures::*;
    use super::*;

    fn edit(index: usize, text: &str) -> SpanEdit {
        SpanEdit {
            span_index: index,
            new_text: text.to_string(),
            font: None,
            size: None,
            color: None,
        }
    }

    fn insert(x: f64, y: f64, text: &str) -> TextInsert {
        TextInsert {
            x,
            y,
            text: text.to_string(),
            font: None,
            size: None,
            color: None,
        }
    }

    fn texts(doc: &PdfDocument, page: usize) -> Vec<String> {
        scan_page(doc, page).unwrap().spans.into_iter().map(|s| s.text).collect()
    }

    fn with_content(content: &[u8]) -> PdfDocument {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        doc.set_page_content(0, content.to_vec()).unwrap();
        doc
    }

    #[test]
    fn test_replace_keeps_origin_font_and_size() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        edit_span(&mut doc, 0, &edit(0, "Goodbye")).unwrap();

        let scan = scan_page(&doc, 0).unwrap();
        let texts: Vec<&str> = scan.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["World", "Goodbye"]);

        let new = &scan.spans[1];
        assert_eq!(new.font.base_font, "Helvetica");
        assert!((new.size - 24.0).abs() < 1e-3);
        assert!((new.origin.0 - 72.0).abs() < 1e-3);
        assert!((new.origin.1 - 92.0).abs() < 1e-3);
        // The existing Helvetica resource is reused
        assert_eq!(new.font_resource, b"F1");
    }

    #[test]
    fn test_delete_leaves_other_boxes() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let before = scan_page(&doc, 0).unwrap().spans[1].bbox;

        edit_span(&mut doc, 0, &edit(0, "")).unwrap();

        let scan = scan_page(&doc, 0).unwrap();
        assert_eq!(scan.spans.len(), 1);
        assert_eq!(scan.spans[0].text, "World");
        assert_eq!(scan.spans[0].bbox, before);
        assert_eq!(texts(&doc, 1), vec!["Second page"]);
    }

    #[test]
    fn test_redaction_keeps_following_text_in_place() {
        let mut doc = with_content(b"BT /F1 12 Tf 100 700 Td (AAA) Tj 0 0 1 rg [(BB) -50 (B)] TJ ET");
        let before = scan_page(&doc, 0).unwrap();
        assert_eq!(before.spans.len(), 2);

        edit_span(&mut doc, 0, &edit(0, "")).unwrap();

        let after = scan_page(&doc, 0).unwrap();
        assert_eq!(after.spans.len(), 1);
        assert_eq!(after.spans[0].text, "BBB");
        let (a, b) = (after.spans[0].bbox, before.spans[1].bbox);
        assert!((a.x0 - b.x0).abs() < 1e-3 && (a.x1 - b.x1).abs() < 1e-3);
    }

    #[test]
    fn test_quote_operators_keep_line_advance() {
        let mut doc = with_content(b"BT /F1 12 Tf 14 TL 100 700 Td (one) Tj (two) ' (three) ' ET");
        edit_span(&mut doc, 0, &edit(1, "")).unwrap();

        let scan = scan_page(&doc, 0).unwrap();
        let texts: Vec<&str> = scan.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "three"]);
        assert!((scan.spans[1].origin.1 - (92.0 + 28.0)).abs() < 1e-3);
    }

    #[test]
    fn test_explicit_style_adds_font_resource() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let request = SpanEdit {
            font: Some("tibo".to_string()),
            size: Some(10.0),
            color: Some("#ff0000".to_string()),
            ..edit(1, "Bold")
        };
        edit_span(&mut doc, 0, &request).unwrap();

        let scan = scan_page(&doc, 0).unwrap();
        let new = scan.spans.last().unwrap();
        assert_eq!(new.text, "Bold");
        assert_eq!(new.font.base_font, "Times-Bold");
        assert_eq!(new.font_resource, b"EF1");
        assert_eq!(new.color.to_hex(), "#ff0000");
        assert!((new.size - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_invalid_style_rejected_without_change() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let before = doc.page_content(0).unwrap();

        let bad_color = SpanEdit {
            color: Some("red".to_string()),
            ..edit(0, "x")
        };
        assert!(matches!(edit_span(&mut doc, 0, &bad_color), Err(EditError::InvalidColor(_))));

        let bad_size = SpanEdit {
            size: Some(0.0),
            ..edit(0, "x")
        };
        assert!(matches!(edit_span(&mut doc, 0, &bad_size), Err(EditError::InvalidSize(_))));

        assert!(matches!(
            edit_span(&mut doc, 0, &edit(9, "x")),
            Err(EditError::StaleIndex { index: 9, count: 2, .. })
        ));
        assert_eq!(doc.page_content(0).unwrap(), before);
    }

    #[test]
    fn test_multiline_and_unencodable_text() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        edit_span(&mut doc, 0, &edit(0, "café ☃\r\nline two")).unwrap();

        let scan = scan_page(&doc, 0).unwrap();
        let texts: Vec<&str> = scan.spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["World", "café ?", "line two"]);
        let gap = scan.spans[2].origin.1 - scan.spans[1].origin.1;
        assert!((gap - 24.0 * LINE_HEIGHT_FACTOR).abs() < 1e-2);
    }

    #[test]
    fn test_add_text_places_box_top_left() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let request = TextInsert {
            size: Some(20.0),
            ..insert(100.0, 300.0, "Added")
        };
        add_text(&mut doc, 1, &request).unwrap();

        let scan = scan_page(&doc, 1).unwrap();
        let added = scan.spans.iter().find(|s| s.text == "Added").unwrap();
        assert!((added.bbox.x0 - 100.0).abs() < 1e-2);
        assert!((added.bbox.y0 - 300.0).abs() < 1e-2);
        assert_eq!(added.color, Rgb::BLACK);
        assert!((added.size - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_add_text_validation() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        assert!(matches!(add_text(&mut doc, 0, &insert(1.0, 1.0, "  ")), Err(EditError::EmptyText)));
        assert!(matches!(
            add_text(&mut doc, 0, &insert(f64::NAN, 1.0, "x")),
            Err(EditError::InvalidGeometry(_))
        ));
        assert!(matches!(
            add_text(&mut doc, 5, &insert(1.0, 1.0, "x")),
            Err(EditError::PageOutOfRange { page: 5, .. })
        ));
    }

    #[test]
    fn test_isolate_wraps_leaking_state() {
        let ops = |src: &[u8]| lopdf::content::Content::decode(src).unwrap().operations;
        let operators = |ops: Vec<Operation>| -> Vec<String> { ops.into_iter().map(|o| o.operator).collect() };

        assert_eq!(operators(isolate(ops(b"q 1 0 0 rg Q"))), vec!["q", "rg", "Q"]);
        assert_eq!(operators(isolate(ops(b"1 0 0 rg"))), vec!["q", "rg", "Q"]);
        assert_eq!(operators(isolate(ops(b"Q q 0 g"))), vec!["q", "q", "g", "Q", "Q"]);
        assert_eq!(operators(isolate(ops(b"BT (x) Tj"))), vec!["BT", "Tj", "ET"]);
    }
}
