use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in PDF user space (points, origin bottom-left).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    #[must_use]
    pub const fn union(&self, other: &Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    #[must_use]
    pub const fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub const fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Upper edge of the box.
    #[must_use]
    pub const fn top(&self) -> f32 {
        self.y0.max(self.y1)
    }
}

/// A single string shown on a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub page: usize,
    pub bbox: BoundingBox,
    pub font_size: f32,
}

/// Text grouped from vertically adjacent runs on one page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfSection {
    pub text: String,
    /// Zero-based page index.
    pub page: usize,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub summary: String,
}

impl PdfSection {
    #[must_use]
    pub fn new(text: impl Into<String>, page: usize, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
            summary: String::new(),
        }
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    #[must_use]
    pub fn note(&self) -> SummaryNote {
        SummaryNote::parse(&self.summary)
    }
}

/// Summary text split into an optional title and a body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryNote {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
}

impl SummaryNote {
    /// Parses model output.
    ///
    /// Output shaped like `Title: ...\nSummary: ...` yields both parts; any
    /// other text becomes the body.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let mut title = None;
        let mut body_lines = Vec::new();
        let mut saw_label = false;

        for line in raw.lines() {
            let line = line.trim();
            if let Some(rest) = strip_label(line, "title:") {
                if title.is_none() && !rest.is_empty() {
                    title = Some(rest.to_string());
                }
                saw_label = true;
            } else if let Some(rest) = strip_label(line, "summary:") {
                if !rest.is_empty() {
                    body_lines.push(rest);
                }
                saw_label = true;
            } else if !line.is_empty() {
                body_lines.push(line);
            }
        }

        if !saw_label {
            return Self {
                title: None,
                body: collapse(raw),
            };
        }

        Self {
            title,
            body: body_lines.join(" "),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.trim().is_empty()
    }
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if head.eq_ignore_ascii_case(label) {
        line.get(label.len()..).map(str::trim)
    } else {
        None
    }
}

fn collapse(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Outcome of a compression request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompressionReport {
    pub original_bytes: usize,
    pub compressed_bytes: usize,
    pub page_count: usize,
    pub images_recompressed: usize,
    pub streams_compressed: usize,
    pub objects_pruned: usize,
    /// True when the rewritten file was not smaller and the input was returned.
    pub kept_original: bool,
}

impl CompressionReport {
    /// Fraction of bytes saved, `0.0` for empty input.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        1.0 - self.compressed_bytes as f64 / self.original_bytes as f64
    }
}

/// Outcome of a summarization request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummaryReport {
    pub page_count: usize,
    pub section_count: usize,
    pub summarized_count: usize,
    pub failed_count: usize,
    pub annotated_pages: usize,
}
