//! Positioned text extraction.
//!
//! Page content streams are interpreted for their text operators only. Each
//! shown string becomes a [`TextRun`] positioned at the text matrix origin,
//! and runs are grouped into [`PdfSection`]s by vertical proximity.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object};
use summit_model::defaults::LINE_MERGE_TOLERANCE;
use summit_model::{BoundingBox, PdfSection, TextRun};
use tracing::debug;

use super::fonts::{FontInfo, fonts_in};
use super::{PdfError, inherited, load, number, resolve, resolve_dict, stream_data};

const DEFAULT_FONT_SIZE: f32 = 12.0;
const MAX_FORM_DEPTH: usize = 8;
/// `TJ` adjustments below this (in thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -200.0;

type Matrix = [f32; 6];
const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Options for grouping extracted text.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub line_merge_tolerance: f32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            line_merge_tolerance: LINE_MERGE_TOLERANCE,
        }
    }
}

impl ExtractOptions {
    #[must_use]
    pub const fn with_line_merge_tolerance(mut self, tolerance: f32) -> Self {
        self.line_merge_tolerance = tolerance;
        self
    }
}

/// Output from extracting a document.
#[derive(Debug, Clone)]
pub struct ExtractOutput {
    pub page_count: usize,
    pub sections: Vec<PdfSection>,
}

/// Extracts grouped text sections from every page.
///
/// # Errors
/// Returns `PdfError` if the document cannot be loaded or a page content
/// stream cannot be decoded.
pub fn extract_sections(bytes: &[u8], options: &ExtractOptions) -> Result<ExtractOutput, PdfError> {
    let doc = load(bytes)?;
    let pages = doc.get_pages();
    let mut sections = Vec::new();

    for (index, page_id) in pages.values().enumerate() {
        let runs = extract_page_runs(&doc, index, *page_id)?;
        debug!(page = index + 1, runs = runs.len(), "extracted text runs");
        sections.extend(group_runs(&runs, options.line_merge_tolerance));
    }

    Ok(ExtractOutput {
        page_count: pages.len(),
        sections,
    })
}

/// Interprets one page and returns its text runs in content order.
///
/// # Errors
/// Returns `PdfError::Malformed` if the page content cannot be decoded.
pub fn extract_page_runs(
    doc: &Document,
    page: usize,
    page_id: lopdf::ObjectId,
) -> Result<Vec<TextRun>, PdfError> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|err| PdfError::Malformed(format!("page {}: {err}", page + 1)))?;
    let content = Content::decode(&data)
        .map_err(|err| PdfError::Malformed(format!("page {}: {err}", page + 1)))?;
    let resources = inherited(doc, page_id, b"Resources").and_then(|value| resolve_dict(doc, value));

    let mut interpreter = Interpreter {
        doc,
        page,
        runs: Vec::new(),
    };
    interpreter.run(&content.operations, resources, 0);
    Ok(interpreter.runs)
}

/// Groups runs into sections.
///
/// A run joins the current section while its baseline lies within
/// `tolerance` of the section's lowest baseline; otherwise the section is
/// closed and a new one starts.
#[must_use]
pub fn group_runs(runs: &[TextRun], tolerance: f32) -> Vec<PdfSection> {
    let mut sections = Vec::new();
    let mut current: Option<(String, usize, BoundingBox)> = None;

    for run in runs {
        current = match current.take() {
            Some((mut text, page, bbox))
                if page == run.page && (run.bbox.y0 - bbox.y0).abs() < tolerance =>
            {
                text.push(' ');
                text.push_str(&run.text);
                Some((text, page, bbox.union(&run.bbox)))
            }
            previous => {
                if let Some((text, page, bbox)) = previous {
                    push_section(&mut sections, &text, page, bbox);
                }
                Some((run.text.clone(), run.page, run.bbox))
            }
        };
    }
    if let Some((text, page, bbox)) = current {
        push_section(&mut sections, &text, page, bbox);
    }
    sections
}

fn push_section(sections: &mut Vec<PdfSection>, text: &str, page: usize, bbox: BoundingBox) {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        sections.push(PdfSection::new(text, page, bbox));
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Option<Vec<u8>>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            size: DEFAULT_FONT_SIZE,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
        }
    }
}

struct Interpreter<'a> {
    doc: &'a Document,
    page: usize,
    runs: Vec<TextRun>,
}

struct Scope<'a> {
    fonts: HashMap<Vec<u8>, FontInfo>,
    resources: Option<&'a Dictionary>,
    state: TextState,
    saved: Vec<TextState>,
    tm: Matrix,
    tlm: Matrix,
}

impl<'a> Interpreter<'a> {
    fn run(&mut self, operations: &[Operation], resources: Option<&'a Dictionary>, depth: usize) {
        let mut scope = Scope {
            fonts: fonts_in(self.doc, resources),
            resources,
            state: TextState::default(),
            saved: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
        };

        for operation in operations {
            let operands = &operation.operands;
            let arg = |index: usize| operands.get(index).and_then(number);
            match operation.operator.as_str() {
                "q" => scope.saved.push(scope.state.clone()),
                "Q" => {
                    if let Some(state) = scope.saved.pop() {
                        scope.state = state;
                    }
                }
                "BT" => {
                    scope.tm = IDENTITY;
                    scope.tlm = IDENTITY;
                }
                "Tf" => {
                    if let Some(Object::Name(font)) = operands.first() {
                        scope.state.font = Some(font.clone());
                    }
                    if let Some(size) = arg(1) {
                        scope.state.size = size;
                    }
                }
                "Tc" => scope.state.char_spacing = arg(0).unwrap_or(0.0),
                "Tw" => scope.state.word_spacing = arg(0).unwrap_or(0.0),
                "Tz" => scope.state.horizontal_scale = arg(0).unwrap_or(100.0) / 100.0,
                "TL" => scope.state.leading = arg(0).unwrap_or(0.0),
                "Td" => scope.move_line(arg(0).unwrap_or(0.0), arg(1).unwrap_or(0.0)),
                "TD" => {
                    let ty = arg(1).unwrap_or(0.0);
                    scope.state.leading = -ty;
                    scope.move_line(arg(0).unwrap_or(0.0), ty);
                }
                "Tm" => {
                    if let [Some(a), Some(b), Some(c), Some(d), Some(e), Some(f)] =
                        [arg(0), arg(1), arg(2), arg(3), arg(4), arg(5)]
                    {
                        scope.tm = [a, b, c, d, e, f];
                        scope.tlm = scope.tm;
                    }
                }
                "T*" => scope.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&mut scope, &[Piece::Text(bytes)]);
                    }
                }
                "'" => {
                    scope.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(&mut scope, &[Piece::Text(bytes)]);
                    }
                }
                "\"" => {
                    scope.state.word_spacing = arg(0).unwrap_or(scope.state.word_spacing);
                    scope.state.char_spacing = arg(1).unwrap_or(scope.state.char_spacing);
                    scope.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(&mut scope, &[Piece::Text(bytes)]);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let pieces: Vec<Piece<'_>> = items
                            .iter()
                            .filter_map(|item| match item {
                                Object::String(bytes, _) => Some(Piece::Text(bytes)),
                                other => number(other).map(Piece::Adjust),
                            })
                            .collect();
                        self.show(&mut scope, &pieces);
                    }
                }
                "Do" if depth < MAX_FORM_DEPTH => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.run_form(scope.resources, name, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn run_form(&mut self, resources: Option<&'a Dictionary>, name: &[u8], depth: usize) {
        let doc = self.doc;
        let Some(Object::Stream(stream)) = resources
            .and_then(|resources| resources.get(b"XObject").ok())
            .and_then(|value| resolve_dict(doc, value))
            .and_then(|xobjects| xobjects.get(name).ok())
            .map(|value| resolve(doc, value))
        else {
            return;
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|value| super::name(resolve(doc, value)))
            == Some(b"Form".as_slice());
        if !is_form {
            return;
        }
        let Some(content) = stream_data(stream)
            .ok()
            .and_then(|data| Content::decode(&data).ok())
        else {
            debug!(page = self.page + 1, "skipping undecodable form xobject");
            return;
        };
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|value| resolve_dict(doc, value))
            .or(resources);
        self.run(&content.operations, form_resources, depth + 1);
    }

    fn show(&mut self, scope: &mut Scope<'_>, pieces: &[Piece<'_>]) {
        let fallback = FontInfo::default();
        let font = scope
            .state
            .font
            .as_ref()
            .and_then(|name| scope.fonts.get(name))
            .unwrap_or(&fallback);
        let state = &scope.state;

        let origin = (scope.tm[4], scope.tm[5]);
        let x_scale = scope.tm[0].hypot(scope.tm[1]);
        let y_scale = scope.tm[2].hypot(scope.tm[3]);
        let mut text = String::new();
        let mut advance = 0.0_f32;

        for piece in pieces {
            match piece {
                Piece::Text(bytes) => {
                    let (decoded, codes) = font.decode(bytes);
                    text.push_str(&decoded);
                    for code in codes {
                        let mut glyph = font.width(code) / 1000.0 * state.size + state.char_spacing;
                        if font.is_word_space(code) {
                            glyph += state.word_spacing;
                        }
                        advance += glyph * state.horizontal_scale;
                    }
                }
                Piece::Adjust(amount) => {
                    if *amount < TJ_SPACE_THRESHOLD && !text.ends_with(' ') && !text.is_empty() {
                        text.push(' ');
                    }
                    advance -= amount / 1000.0 * state.size * state.horizontal_scale;
                }
            }
        }

        scope.tm[4] += advance * scope.tm[0];
        scope.tm[5] += advance * scope.tm[1];

        if text.trim().is_empty() {
            return;
        }
        let size = state.size * if y_scale > 0.0 { y_scale } else { 1.0 };
        let size = if size > 0.0 { size } else { DEFAULT_FONT_SIZE };
        let width = advance * if x_scale > 0.0 { x_scale } else { 1.0 };
        let (x0, x1) = if width >= 0.0 {
            (origin.0, origin.0 + width)
        } else {
            (origin.0 + width, origin.0)
        };
        self.runs.push(TextRun {
            text,
            page: self.page,
            bbox: BoundingBox::new(x0, origin.1, x1, origin.1 + size),
            font_size: size,
        });
    }
}

enum Piece<'a> {
    Text(&'a [u8]),
    Adjust(f32),
}

impl Scope<'_> {
    fn move_line(&mut self, tx: f32, ty: f32) {
        let [a, b, c, d, e, f] = self.tlm;
        self.tlm = [a, b, c, d, tx.mul_add(a, ty * c) + e, tx.mul_add(b, ty * d) + f];
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }
}
