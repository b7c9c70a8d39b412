//! Lossless stream compression plus optional image recompression.

use lopdf::Object;
use summit_model::CompressionReport;
use summit_model::defaults::PRODUCER;
use tracing::info;

use super::images::{ImageOptions, recompress_images};
use super::{PdfError, load, save, stamp_info};

#[derive(Debug, Clone)]
pub struct CompressOptions {
    pub recompress_images: bool,
    pub image: ImageOptions,
    pub producer: String,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            recompress_images: true,
            image: ImageOptions::default(),
            producer: PRODUCER.to_string(),
        }
    }
}

impl CompressOptions {
    #[must_use]
    pub const fn with_recompress_images(mut self, enabled: bool) -> Self {
        self.recompress_images = enabled;
        self
    }

    #[must_use]
    pub fn with_image_options(mut self, image: ImageOptions) -> Self {
        self.image = image;
        self
    }

    #[must_use]
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompressOutput {
    pub bytes: Vec<u8>,
    pub report: CompressionReport,
}

/// Compresses a PDF.
///
/// When the rewritten file is not smaller than the input, the input bytes
/// are returned unchanged and `report.kept_original` is set.
///
/// # Errors
/// Returns `PdfError` if the input cannot be loaded or the output cannot be
/// written.
pub fn compress_pdf(bytes: &[u8], options: &CompressOptions) -> Result<CompressOutput, PdfError> {
    let mut doc = load(bytes)?;
    let page_count = doc.get_pages().len();

    let images_recompressed = if options.recompress_images {
        recompress_images(&mut doc, &options.image)
    } else {
        0
    };

    doc.delete_zero_length_streams();
    let objects_before = doc.objects.len();
    doc.prune_objects();
    let objects_pruned = objects_before.saturating_sub(doc.objects.len());

    let unfiltered = count_unfiltered_streams(&doc);
    doc.compress();
    let streams_compressed = unfiltered.saturating_sub(count_unfiltered_streams(&doc));

    doc.renumber_objects();
    stamp_info(&mut doc, &options.producer);
    let rewritten = save(&mut doc)?;

    let kept_original = rewritten.len() >= bytes.len();
    let output = if kept_original {
        bytes.to_vec()
    } else {
        rewritten
    };

    let report = CompressionReport {
        original_bytes: bytes.len(),
        compressed_bytes: output.len(),
        page_count,
        images_recompressed,
        streams_compressed,
        objects_pruned,
        kept_original,
    };
    info!(
        original_kb = report.original_bytes / 1024,
        compressed_kb = report.compressed_bytes / 1024,
        ratio = %format!("{:.1}%", report.ratio() * 100.0),
        images_recompressed,
        kept_original,
        "compressed PDF"
    );

    Ok(CompressOutput {
        bytes: output,
        report,
    })
}

fn count_unfiltered_streams(doc: &lopdf::Document) -> usize {
    doc.objects
        .values()
        .filter(|object| matches!(object, Object::Stream(stream) if !stream.dict.has(b"Filter")))
        .count()
}
