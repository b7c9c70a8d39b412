//! Margin annotation.
//!
//! Each annotated page is widened to the right and the new strip is used as
//! a sidebar for section notes. Original content streams are left byte for
//! byte intact; they are only bracketed by a `q`/`Q` pair.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use summit_model::defaults::{MARGIN_WIDTH, PRODUCER};
use summit_model::{PdfSection, SummaryNote};
use tracing::{debug, info};

use super::encoding::encode_win_ansi;
use super::metrics::{Face, with_ellipsis, wrap};
use super::{PdfError, inherited, load, media_box, real, rect, resolve, resolve_dict, save, stamp_info};

const REGULAR_FONT: &str = "SumH";
const BOLD_FONT: &str = "SumHB";
const LINE_SPACING: f32 = 1.25;

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    pub margin_width: f32,
    pub font_size: f32,
    pub title_size: f32,
    pub padding: f32,
    pub note_gap: f32,
    pub producer: String,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            margin_width: MARGIN_WIDTH,
            font_size: 7.5,
            title_size: 8.5,
            padding: 8.0,
            note_gap: 6.0,
            producer: PRODUCER.to_string(),
        }
    }
}

impl AnnotateOptions {
    #[must_use]
    pub const fn with_margin_width(mut self, margin_width: f32) -> Self {
        self.margin_width = margin_width;
        self
    }

    #[must_use]
    pub const fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    #[must_use]
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct AnnotateOutput {
    pub bytes: Vec<u8>,
    pub annotated_pages: usize,
    pub notes_placed: usize,
    pub notes_dropped: usize,
}

/// Writes section summaries into a sidebar on each page that has any.
///
/// # Errors
/// Returns `PdfError` if the document cannot be loaded, a content stream
/// cannot be encoded, or the output cannot be written.
pub fn annotate_pdf(
    bytes: &[u8],
    sections: &[PdfSection],
    options: &AnnotateOptions,
) -> Result<AnnotateOutput, PdfError> {
    let mut doc = load(bytes)?;
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    let mut notes_by_page: BTreeMap<usize, Vec<(f32, SummaryNote)>> = BTreeMap::new();
    for section in sections {
        let note = section.note();
        if note.is_empty() || section.page >= page_ids.len() {
            continue;
        }
        notes_by_page
            .entry(section.page)
            .or_default()
            .push((section.bbox.top(), note));
    }

    let mut output = AnnotateOutput {
        bytes: Vec::new(),
        annotated_pages: 0,
        notes_placed: 0,
        notes_dropped: 0,
    };

    if !notes_by_page.is_empty() {
        let regular = add_font(&mut doc, Face::Regular);
        let bold = add_font(&mut doc, Face::Bold);

        for (page, mut notes) in notes_by_page {
            notes.sort_by(|left, right| right.0.total_cmp(&left.0));
            let page_id = page_ids[page];
            let placement = annotate_page(&mut doc, page_id, &notes, regular, bold, options)?;
            debug!(
                page = page + 1,
                placed = placement.placed,
                dropped = placement.dropped,
                "annotated page"
            );
            output.annotated_pages += 1;
            output.notes_placed += placement.placed;
            output.notes_dropped += placement.dropped;
        }
    }

    doc.compress();
    stamp_info(&mut doc, &options.producer);
    output.bytes = save(&mut doc)?;

    info!(
        pages = output.annotated_pages,
        notes = output.notes_placed,
        dropped = output.notes_dropped,
        "annotated PDF"
    );
    Ok(output)
}

fn add_font(doc: &mut Document, face: Face) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => face.base_font(),
        "Encoding" => "WinAnsiEncoding",
    })
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Placement {
    placed: usize,
    dropped: usize,
}

fn annotate_page(
    doc: &mut Document,
    page_id: ObjectId,
    notes: &[(f32, SummaryNote)],
    regular: ObjectId,
    bold: ObjectId,
    options: &AnnotateOptions,
) -> Result<Placement, PdfError> {
    let media = media_box(doc, page_id);
    let crop = inherited(doc, page_id, b"CropBox").and_then(|value| rect(doc, value));
    let visible = crop.unwrap_or(media);
    let sidebar_x = visible[2];
    let right_edge = sidebar_x + options.margin_width;

    let sidebar = Sidebar {
        x0: sidebar_x,
        y0: visible[1],
        x1: right_edge,
        y1: visible[3],
    };
    let (mut operations, placement) = layout_notes(&sidebar, notes, options);
    operations.insert(0, Operation::new("Q", vec![]));
    let encode = |operations: Vec<Operation>| {
        Content { operations }
            .encode()
            .map_err(|err| PdfError::Write(err.to_string()))
    };
    let prefix = encode(vec![Operation::new("q", vec![])])?;
    let suffix = encode(operations)?;

    let mut contents = vec![Object::Reference(doc.add_object(Stream::new(dictionary! {}, prefix)))];
    contents.extend(existing_contents(doc, page_id));
    contents.push(Object::Reference(doc.add_object(Stream::new(dictionary! {}, suffix))));

    let resources = private_resources(doc, page_id, regular, bold);

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| PdfError::Malformed(err.to_string()))?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    page.set(
        "MediaBox",
        rect_object([media[0], media[1], media[2].max(right_edge), media[3]]),
    );
    if let Some(crop) = crop {
        page.set("CropBox", rect_object([crop[0], crop[1], right_edge, crop[3]]));
    }
    Ok(placement)
}

fn rect_object(values: [f32; 4]) -> Object {
    Object::Array(values.into_iter().map(real).collect())
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    }
}

/// Clones the effective resources so shared dictionaries stay untouched.
fn private_resources(doc: &Document, page_id: ObjectId, regular: ObjectId, bold: ObjectId) -> Dictionary {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|value| resolve_dict(doc, value))
        .cloned()
        .unwrap_or_else(Dictionary::new);
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .map(|value| resolve(doc, value))
        .and_then(|value| match value {
            Object::Dictionary(fonts) => Some(fonts.clone()),
            _ => None,
        })
        .unwrap_or_else(Dictionary::new);
    fonts.set(REGULAR_FONT, regular);
    fonts.set(BOLD_FONT, bold);
    resources.set("Font", Object::Dictionary(fonts));
    resources
}

struct Sidebar {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

struct Line {
    face: Face,
    size: f32,
    text: String,
}

impl Line {
    fn height(&self) -> f32 {
        self.size * LINE_SPACING
    }
}

/// Produces the drawing operations for one sidebar.
fn layout_notes(
    sidebar: &Sidebar,
    notes: &[(f32, SummaryNote)],
    options: &AnnotateOptions,
) -> (Vec<Operation>, Placement) {
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![real(0.96), real(0.96), real(0.94)]),
        Operation::new(
            "re",
            vec![
                real(sidebar.x0),
                real(sidebar.y0),
                real(sidebar.x1 - sidebar.x0),
                real(sidebar.y1 - sidebar.y0),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("G", vec![real(0.7)]),
        Operation::new("w", vec![real(0.5)]),
        Operation::new("m", vec![real(sidebar.x0), real(sidebar.y0)]),
        Operation::new("l", vec![real(sidebar.x0), real(sidebar.y1)]),
        Operation::new("S", vec![]),
        Operation::new("rg", vec![real(0.15), real(0.15), real(0.2)]),
    ];

    let text_x = sidebar.x0 + options.padding;
    let text_width = (sidebar.x1 - sidebar.x0 - 2.0 * options.padding).max(1.0);
    let floor = sidebar.y0 + options.padding;
    let mut cursor = sidebar.y1 - options.padding;
    let mut placement = Placement::default();

    for (index, (top, note)) in notes.iter().enumerate() {
        let lines = note_lines(note, text_width, options);
        let mut y = top.min(cursor);
        let mut fitted: Vec<(&Line, f32)> = Vec::new();
        for line in &lines {
            let baseline = y - line.size;
            if baseline < floor {
                break;
            }
            fitted.push((line, baseline));
            y -= line.height();
        }

        let truncated = fitted.len() < lines.len();
        if fitted.is_empty() {
            placement.dropped += notes.len() - index;
            break;
        }

        let last = fitted.len() - 1;
        for (position, (line, baseline)) in fitted.iter().enumerate() {
            let text = if truncated && position == last {
                with_ellipsis(&line.text, line.face, line.size, text_width)
            } else {
                line.text.clone()
            };
            operations.extend(show_line(line, &text, text_x, *baseline));
        }
        placement.placed += 1;

        if truncated {
            placement.dropped += notes.len() - index - 1;
            break;
        }
        cursor = y - options.note_gap;
    }

    operations.push(Operation::new("Q", vec![]));
    (operations, placement)
}

fn note_lines(note: &SummaryNote, width: f32, options: &AnnotateOptions) -> Vec<Line> {
    let mut lines = Vec::new();
    if let Some(title) = &note.title {
        lines.extend(
            wrap(title, Face::Bold, options.title_size, width)
                .into_iter()
                .map(|text| Line {
                    face: Face::Bold,
                    size: options.title_size,
                    text,
                }),
        );
    }
    lines.extend(
        wrap(&note.body, Face::Regular, options.font_size, width)
            .into_iter()
            .map(|text| Line {
                face: Face::Regular,
                size: options.font_size,
                text,
            }),
    );
    lines
}

fn show_line(line: &Line, text: &str, x: f32, y: f32) -> Vec<Operation> {
    let font = match line.face {
        Face::Regular => REGULAR_FONT,
        Face::Bold => BOLD_FONT,
    };
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), real(line.size)]),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sidebar(height: f32) -> Sidebar {
        Sidebar {
            x0: 612.0,
            y0: 0.0,
            x1: 792.0,
            y1: height,
        }
    }

    fn shown_text(operations: &[Operation]) -> Vec<Vec<u8>> {
        operations
            .iter()
            .filter(|operation| operation.operator == "Tj")
            .filter_map(|operation| match operation.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    fn note(title: Option<&str>, body: &str) -> SummaryNote {
        SummaryNote {
            title: title.map(str::to_string),
            body: body.to_string(),
        }
    }

    #[test]
    fn notes_are_drawn_with_title_first() {
        let notes = vec![(700.0, note(Some("Revenue"), "Sales grew."))];
        let (operations, placement) = layout_notes(&sidebar(792.0), &notes, &AnnotateOptions::default());
        assert_eq!(placement, Placement { placed: 1, dropped: 0 });
        assert_eq!(
            shown_text(&operations),
            vec![b"Revenue".to_vec(), b"Sales grew.".to_vec()]
        );
        assert_eq!(operations.first().map(|op| op.operator.as_str()), Some("q"));
        assert_eq!(operations.last().map(|op| op.operator.as_str()), Some("Q"));
    }

    #[test]
    fn overflowing_sidebar_truncates_and_drops() {
        let body = "word ".repeat(200);
        let notes = vec![
            (90.0, note(None, &body)),
            (40.0, note(None, "never drawn")),
            (20.0, note(None, "also never drawn")),
        ];
        let (operations, placement) = layout_notes(&sidebar(100.0), &notes, &AnnotateOptions::default());
        assert_eq!(placement, Placement { placed: 1, dropped: 2 });
        let shown = shown_text(&operations);
        let last = shown.last().expect("at least one line should fit");
        assert!(last.ends_with(&[0x85]));
    }

    #[test]
    fn notes_never_overlap_upwards() {
        let options = AnnotateOptions::default();
        let notes = vec![
            (700.0, note(None, "first note")),
            (700.0, note(None, "second note")),
        ];
        let (operations, _) = layout_notes(&sidebar(792.0), &notes, &options);
        let baselines: Vec<f32> = operations
            .iter()
            .filter(|operation| operation.operator == "Td")
            .filter_map(|operation| operation.operands.get(1).and_then(super::super::number))
            .collect();
        assert_eq!(baselines.len(), 2);
        assert!(baselines[1] < baselines[0] - options.font_size);
    }
}
