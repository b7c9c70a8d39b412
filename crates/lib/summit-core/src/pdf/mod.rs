//! PDF engine built on `lopdf`.
//!
//! Each submodule owns one transformation over a loaded document: stream and
//! image compression, positioned text extraction, and margin annotation.

pub mod annotate;
pub mod cmap;
pub mod compress;
pub mod encoding;
pub mod extract;
pub mod fonts;
pub mod images;
pub mod metrics;

use std::{error::Error, fmt};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

pub use annotate::{AnnotateOptions, AnnotateOutput, annotate_pdf};
pub use compress::{CompressOptions, CompressOutput, compress_pdf};
pub use extract::{ExtractOptions, ExtractOutput, extract_sections, group_runs};
pub use images::ImageOptions;

/// US Letter, used when a page carries no usable `/MediaBox`.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
const MAX_REFERENCE_DEPTH: usize = 16;

#[derive(Debug)]
pub enum PdfError {
    Empty,
    Malformed(String),
    Encrypted,
    NoPages,
    Write(String),
}

impl PdfError {
    /// True when the failure is caused by the uploaded bytes rather than the service.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::Malformed(_) | Self::Encrypted | Self::NoPages
        )
    }
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "the uploaded file is empty"),
            Self::Malformed(message) => write!(f, "invalid or corrupted PDF file: {message}"),
            Self::Encrypted => write!(f, "encrypted PDF files are not supported"),
            Self::NoPages => write!(f, "the PDF file contains no pages"),
            Self::Write(message) => write!(f, "error writing PDF: {message}"),
        }
    }
}

impl Error for PdfError {}

/// Parses a document and rejects inputs the engine cannot process.
///
/// # Errors
/// Returns `PdfError` for empty, unparsable, encrypted, or page-less input.
pub fn load(bytes: &[u8]) -> Result<Document, PdfError> {
    if bytes.is_empty() {
        return Err(PdfError::Empty);
    }
    let doc = Document::load_mem(bytes).map_err(|err| PdfError::Malformed(err.to_string()))?;
    if doc.trailer.has(b"Encrypt") {
        return Err(PdfError::Encrypted);
    }
    if doc.get_pages().is_empty() {
        return Err(PdfError::NoPages);
    }
    Ok(doc)
}

/// Serializes a document to bytes.
///
/// # Errors
/// Returns `PdfError::Write` if serialization fails.
pub fn save(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| PdfError::Write(err.to_string()))?;
    Ok(output)
}

/// Records the producer and modification date in the Info dictionary.
pub fn stamp_info(doc: &mut Document, producer: &str) {
    let mod_date = chrono::Utc::now().format("D:%Y%m%d%H%M%SZ").to_string();
    let info_id = doc
        .trailer
        .get(b"Info")
        .and_then(Object::as_reference)
        .ok()
        .filter(|id| matches!(doc.objects.get(id), Some(Object::Dictionary(_))));

    let info_id = info_id.unwrap_or_else(|| {
        let existing = doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_dict)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new());
        let id = doc.add_object(existing);
        doc.trailer.set("Info", id);
        id
    });

    if let Some(Object::Dictionary(info)) = doc.objects.get_mut(&info_id) {
        info.set("Producer", Object::string_literal(producer));
        info.set("ModDate", Object::string_literal(mod_date));
    }
}

/// Follows indirect references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> &'a Object {
    for _ in 0..MAX_REFERENCE_DEPTH {
        let Object::Reference(id) = object else {
            return object;
        };
        match doc.get_object(*id) {
            Ok(target) => object = target,
            Err(_) => return object,
        }
    }
    object
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    object.as_float().ok()
}

pub(crate) fn real(value: f32) -> Object {
    Object::Real(value.into())
}

pub(crate) fn name(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

/// Looks up a page attribute, walking `/Parent` links for inheritable keys.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok();
    for _ in 0..MAX_REFERENCE_DEPTH {
        let dict = current?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict
            .get(b"Parent")
            .ok()
            .and_then(|parent| resolve_dict(doc, parent));
    }
    None
}

/// Reads a rectangle array such as `/MediaBox`, normalizing corner order.
pub(crate) fn rect(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let Object::Array(items) = resolve(doc, object) else {
        return None;
    };
    if items.len() != 4 {
        return None;
    }
    let mut values = [0.0_f32; 4];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = number(resolve(doc, item))?;
    }
    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|value| rect(doc, value))
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// Returns the filter chain of a stream in application order.
pub(crate) fn filters(doc: &Document, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter").map(|value| resolve(doc, value)) {
        Ok(Object::Name(filter)) => vec![filter.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| name(resolve(doc, item)).map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Returns decoded stream data, handling streams that carry no filter.
pub(crate) fn stream_data(stream: &Stream) -> Result<Vec<u8>, PdfError> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|err| PdfError::Malformed(err.to_string()))
    } else {
        Ok(stream.content.clone())
    }
}
