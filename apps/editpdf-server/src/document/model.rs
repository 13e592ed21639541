//! In-memory PDF document
//!
//! [`PdfDocument`] wraps a parsed `lopdf::Document` together with its page
//! table. It is cheap to reason about for history purposes: a clone is a
//! complete, independent capture of the document state.

use std::collections::HashSet;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::error::{EditError, Result};
use super::geometry::{PageGeometry, Rect};

/// US Letter, used when a page declares no usable box.
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Parent chains longer than this are treated as cycles.
const MAX_INHERITANCE_DEPTH: usize = 32;

static NULL: Object = Object::Null;

/// A loaded, editable PDF
#[derive(Debug, Clone)]
pub struct PdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PdfDocument {
    /// Parse a PDF from bytes.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(EditError::InvalidDocument("empty file".to_string()));
        }
        let doc = Document::load_mem(bytes)
            .map_err(|e| EditError::InvalidDocument(format!("not a readable PDF: {}", e)))?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(EditError::InvalidDocument(
                "encrypted documents are not supported".to_string(),
            ));
        }
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(EditError::InvalidDocument("document has no pages".to_string()));
        }
        Ok(Self { doc, pages })
    }

    /// Serialize the current state.
    pub fn save(&self) -> Result<Vec<u8>> {
        // save_to takes &mut self; serialize a copy so reads never mutate
        let mut doc = self.doc.clone();
        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| EditError::Pdf(format!("failed to serialize document: {}", e)))?;
        Ok(out)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn page_id(&self, page: usize) -> Result<ObjectId> {
        self.pages.get(page).copied().ok_or(EditError::PageOutOfRange {
            page,
            count: self.pages.len(),
        })
    }

    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Follow references until a direct object is reached.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            match current {
                Object::Reference(id) => match self.doc.get_object(*id) {
                    Ok(target) => current = target,
                    Err(_) => return &NULL,
                },
                _ => return current,
            }
        }
        &NULL
    }

    /// Resolve `dict[key]` to a direct object.
    pub fn get_resolved<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        dict.get(key).ok().map(|obj| self.resolve(obj))
    }

    pub fn get_dict<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        self.get_resolved(dict, key).and_then(|obj| obj.as_dict().ok())
    }

    pub fn get_number(&self, dict: &Dictionary, key: &[u8]) -> Option<f64> {
        self.get_resolved(dict, key).and_then(number)
    }

    /// Look up a page attribute, walking up the page tree for inheritable keys.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = current.get(key) {
                return Some(self.resolve(value));
            }
            let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
            current = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    /// Visible box and rotation of a page.
    pub fn geometry(&self, page: usize) -> Result<PageGeometry> {
        let id = self.page_id(page)?;
        let read_box = |key: &[u8]| -> Option<Rect> {
            let values = self.inherited(id, key)?.as_array().ok()?;
            if values.len() != 4 {
                return None;
            }
            let nums: Vec<f64> = values.iter().filter_map(|v| number(self.resolve(v))).collect();
            if nums.len() != 4 {
                return None;
            }
            let rect = Rect::new(nums[0], nums[1], nums[2], nums[3]);
            (!rect.is_empty()).then_some(rect)
        };
        let media = read_box(b"MediaBox").unwrap_or_else(|| {
            let [x0, y0, x1, y1] = DEFAULT_MEDIA_BOX;
            Rect::new(x0, y0, x1, y1)
        });
        // A crop box only narrows the media box
        let bounds = read_box(b"CropBox")
            .and_then(|crop| {
                let clipped = Rect {
                    x0: crop.x0.max(media.x0),
                    y0: crop.y0.max(media.y0),
                    x1: crop.x1.min(media.x1),
                    y1: crop.y1.min(media.y1),
                };
                (!clipped.is_empty()).then_some(clipped)
            })
            .unwrap_or(media);
        let rotation = self
            .inherited(id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        Ok(PageGeometry::new(bounds, rotation))
    }

    /// Resource dictionary in effect for a page (own or inherited).
    pub fn resources(&self, page: usize) -> Result<Option<&Dictionary>> {
        let id = self.page_id(page)?;
        Ok(self
            .inherited(id, b"Resources")
            .and_then(|obj| obj.as_dict().ok()))
    }

    /// Look up a named entry in one resource category (`Font`, `XObject`, ...).
    pub fn resource(&self, page: usize, category: &[u8], name: &[u8]) -> Result<Option<&Object>> {
        let Some(resources) = self.resources(page)? else {
            return Ok(None);
        };
        Ok(self
            .get_dict(resources, category)
            .and_then(|entries| self.get_resolved(entries, name)))
    }

    /// Give the page its own direct `/Resources` dictionary with direct
    /// `Font` and `XObject` sub-dictionaries, so adding an entry never leaks
    /// into pages that shared the original.
    fn materialize_resources(&mut self, page: usize) -> Result<()> {
        let id = self.page_id(page)?;
        let mut resources = self
            .inherited(id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default();
        for category in [b"Font".as_slice(), b"XObject".as_slice()] {
            if let Some(entries) = self.get_dict(&resources, category).cloned() {
                resources.set(category.to_vec(), Object::Dictionary(entries));
            }
        }
        self.doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)?
            .set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    /// Add an indirect object to a resource category under a fresh name
    /// starting with `prefix`. Returns the name used.
    pub fn add_resource(
        &mut self,
        page: usize,
        category: &str,
        prefix: &str,
        object_id: ObjectId,
    ) -> Result<Vec<u8>> {
        self.materialize_resources(page)?;
        let id = self.page_id(page)?;
        let resources = self
            .doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)?
            .get_mut(b"Resources")
            .and_then(Object::as_dict_mut)?;
        if !matches!(resources.get(category.as_bytes()), Ok(Object::Dictionary(_))) {
            resources.set(category, Dictionary::new());
        }
        let entries = resources
            .get_mut(category.as_bytes())
            .and_then(Object::as_dict_mut)?;
        let name = (1..)
            .map(|n| format!("{}{}", prefix, n).into_bytes())
            .find(|candidate| !entries.has(candidate))
            .unwrap_or_else(|| prefix.as_bytes().to_vec());
        entries.set(name.clone(), Object::Reference(object_id));
        Ok(name)
    }

    /// Object ids of the streams forming a page's content.
    fn content_stream_ids(&self, page_id: ObjectId) -> Vec<ObjectId> {
        let Ok(page) = self.doc.get_dictionary(page_id) else {
            return Vec::new();
        };
        let mut ids = Vec::new();
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => {
                    ids.push(*id);
                    ids.extend(items.iter().filter_map(|o| o.as_reference().ok()));
                }
                Ok(_) => ids.push(*id),
                Err(_) => {}
            },
            Ok(Object::Array(items)) => {
                ids.extend(items.iter().filter_map(|o| o.as_reference().ok()));
            }
            _ => {}
        }
        ids
    }

    /// Decoded content of a page, all content streams concatenated.
    pub fn page_content(&self, page: usize) -> Result<Vec<u8>> {
        let id = self.page_id(page)?;
        let mut content = Vec::new();
        for stream_id in self.content_stream_ids(id) {
            let Ok(Object::Stream(stream)) = self.doc.get_object(stream_id) else {
                continue;
            };
            let data = if stream.dict.has(b"Filter") {
                stream.decompressed_content().map_err(|e| {
                    EditError::Pdf(format!("cannot decode content stream {:?}: {}", stream_id, e))
                })?
            } else {
                stream.content.clone()
            };
            if !content.is_empty() {
                content.push(b'\n');
            }
            content.extend_from_slice(&data);
        }
        Ok(content)
    }

    /// Replace a page's content with a single new stream. Content streams no
    /// other page uses are dropped from the document.
    pub fn set_page_content(&mut self, page: usize, content: Vec<u8>) -> Result<()> {
        let id = self.page_id(page)?;
        let old_ids = self.content_stream_ids(id);

        let stream_id = self.add_object(compressed_stream(Dictionary::new(), &content)?);
        self.doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)?
            .set("Contents", Object::Reference(stream_id));

        let still_used: HashSet<ObjectId> = self
            .pages
            .iter()
            .flat_map(|other| self.content_stream_ids(*other))
            .collect();
        for old in old_ids {
            if !still_used.contains(&old) {
                self.doc.objects.remove(&old);
            }
        }
        Ok(())
    }

    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        self.doc.add_object(object)
    }
}

/// Flate-compress `data` into a stream with the given dictionary.
pub fn compressed_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map(|compressed| {
            dict.set("Filter", "FlateDecode");
            Stream::new(dict, compressed)
        })
        .map_err(|e| EditError::Internal(format!("compression failed: {}", e)))
}

/// Read an integer or real PDF object as `f64`.
pub fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Build a standard 14 Type1 font dictionary with WinAnsi encoding.
pub fn standard_font(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small PDFs built in memory for tests.

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream, StringFormat};

    /// A page's text: `(font resource, size, x, y, text)` drawn in black.
    pub type Line<'a> = (&'a str, f64, f64, f64, &'a str);

    fn text_ops(lines: &[Line<'_>]) -> Vec<Operation> {
        let mut ops = Vec::new();
        for (font, size, x, y, text) in lines {
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new(
                "Tf",
                vec![Object::Name(font.as_bytes().to_vec()), Object::Real(*size as f32)],
            ));
            ops.push(Operation::new(
                "Td",
                vec![Object::Real(*x as f32), Object::Real(*y as f32)],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ));
            ops.push(Operation::new("ET", vec![]));
        }
        ops
    }

    /// Letter-sized pages with Helvetica as `/F1` and Times-Roman as `/F2`.
    pub fn pdf_with_pages(pages: &[Vec<Line<'_>>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let helvetica = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let times = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Times-Roman",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => Object::Reference(helvetica),
                "F2" => Object::Reference(times),
            },
        });

        let mut kids = Vec::new();
        for lines in pages {
            let content = Content {
                operations: text_ops(lines),
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => Object::Reference(resources),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// Two pages: "Hello" and "World" on page 0, "Second page" on page 1.
    pub fn two_page_pdf() -> Vec<u8> {
        pdf_with_pages(&[
            vec![("F1", 24.0, 72.0, 700.0, "Hello"), ("F2", 12.0, 72.0, 650.0, "World")],
            vec![("F1", 12.0, 72.0, 700.0, "Second page")],
        ])
    }

    /// A small opaque RGB PNG.
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_load_rejects_garbage() {
        assert!(matches!(
            PdfDocument::load(b""),
            Err(EditError::InvalidDocument(_))
        ));
        assert!(matches!(
            PdfDocument::load(b"not a pdf at all"),
            Err(EditError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_load_and_geometry() {
        let doc = PdfDocument::load(&two_page_pdf()).unwrap();
        assert_eq!(doc.page_count(), 2);

        let geom = doc.geometry(1).unwrap();
        assert_eq!(geom.width(), 612.0);
        assert_eq!(geom.height(), 792.0);
        assert!(matches!(
            doc.geometry(2),
            Err(EditError::PageOutOfRange { page: 2, count: 2 })
        ));
    }

    #[test]
    fn test_inherited_font_resource() {
        let doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let font = doc.resource(0, b"Font", b"F1").unwrap().unwrap();
        let font = font.as_dict().unwrap();
        assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
    }

    #[test]
    fn test_set_page_content_round_trips() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let before = doc.page_content(1).unwrap();
        doc.set_page_content(0, b"q Q".to_vec()).unwrap();

        assert_eq!(doc.page_content(0).unwrap(), b"q Q");
        assert_eq!(doc.page_content(1).unwrap(), before);

        let reloaded = PdfDocument::load(&doc.save().unwrap()).unwrap();
        assert_eq!(reloaded.page_content(0).unwrap(), b"q Q");
    }

    #[test]
    fn test_add_resource_does_not_touch_other_pages() {
        let mut doc = PdfDocument::load(&two_page_pdf()).unwrap();
        let font_id = doc.add_object(standard_font("Courier"));
        let name = doc.add_resource(0, "Font", "EF", font_id).unwrap();

        assert_eq!(name, b"EF1");
        assert!(doc.resource(0, b"Font", b"EF1").unwrap().is_some());
        assert!(doc.resource(0, b"Font", b"F1").unwrap().is_some());
        assert!(doc.resource(1, b"Font", b"EF1").unwrap().is_none());

        let second = doc.add_resource(0, "Font", "EF", font_id).unwrap();
        assert_eq!(second, b"EF2");
    }
}
