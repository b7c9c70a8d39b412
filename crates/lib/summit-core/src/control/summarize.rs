use std::sync::Arc;

use futures::stream::{self, StreamExt};
use summit_model::defaults::{SUMMARY_FAILURE_TEXT, summarized_file_name};
use summit_model::{PdfSection, SummaryReport};
use tracing::{info, warn};

use crate::pdf::{annotate_pdf, extract_sections};

use super::{ControlError, PdfUpload, SummitControlPlane};

/// An annotated document ready to return to the caller.
#[derive(Debug, Clone)]
pub struct SummarizedPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub sections: Vec<PdfSection>,
    pub report: SummaryReport,
}

enum Outcome {
    Copied(String),
    Summarized(String),
    Failed,
}

impl SummitControlPlane {
    /// Extracts sections, summarizes the long ones and writes the summaries
    /// into the page margins.
    ///
    /// # Errors
    /// Returns `ControlError` if the PDF cannot be processed or a worker task
    /// fails. Summarizer failures do not fail the request.
    pub async fn summarize(&self, upload: PdfUpload) -> Result<SummarizedPdf, ControlError> {
        let PdfUpload { file_name, bytes } = upload;

        let extract_options = self.options.extract.clone();
        let (bytes, extracted) = self
            .run_blocking(move || {
                extract_sections(&bytes, &extract_options).map(|extracted| (bytes, extracted))
            })
            .await?;
        let mut sections = extracted.sections;

        let outcomes = self.summarize_sections(&sections).await;
        let mut report = SummaryReport {
            page_count: extracted.page_count,
            section_count: sections.len(),
            ..SummaryReport::default()
        };
        for (section, outcome) in sections.iter_mut().zip(outcomes) {
            section.summary = match outcome {
                Outcome::Copied(text) => text,
                Outcome::Summarized(summary) => {
                    report.summarized_count += 1;
                    summary
                }
                Outcome::Failed => {
                    report.failed_count += 1;
                    SUMMARY_FAILURE_TEXT.to_string()
                }
            };
        }

        let annotate_options = self.options.annotate.clone();
        let (annotated, sections) = self
            .run_blocking(move || {
                annotate_pdf(&bytes, &sections, &annotate_options).map(|annotated| (annotated, sections))
            })
            .await?;
        report.annotated_pages = annotated.annotated_pages;

        info!(
            pages = report.page_count,
            sections = report.section_count,
            summarized = report.summarized_count,
            failed = report.failed_count,
            summarizer = self.summarizer.name(),
            "summarized PDF"
        );

        Ok(SummarizedPdf {
            file_name: summarized_file_name(&file_name),
            bytes: annotated.bytes,
            sections,
            report,
        })
    }

    async fn summarize_sections(&self, sections: &[PdfSection]) -> Vec<Outcome> {
        let min_words = self.options.summary_min_words;
        let concurrency = self.options.summary_concurrency.max(1);
        let jobs: Vec<(usize, usize, usize, String)> = sections
            .iter()
            .enumerate()
            .map(|(index, section)| (index, section.page, section.word_count(), section.text.clone()))
            .collect();

        stream::iter(jobs)
            .map(|(index, page, words, text)| {
                let summarizer = Arc::clone(&self.summarizer);
                async move {
                    if words <= min_words {
                        return Outcome::Copied(text);
                    }
                    match summarizer.summarize(&text).await {
                        Ok(summary) => Outcome::Summarized(summary),
                        Err(err) => {
                            warn!(
                                section = index,
                                page = page + 1,
                                error = %err,
                                "summary failed"
                            );
                            Outcome::Failed
                        }
                    }
                }
            })
            .buffered(concurrency)
            .collect()
            .await
    }
}
