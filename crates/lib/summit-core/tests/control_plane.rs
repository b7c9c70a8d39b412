mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{build_pdf, line, long_text};
use summit_core::{
    PdfUpload, ProcessingOptions, SummarizeError, Summarizer, SummitControlPlane,
};
use summit_model::defaults::SUMMARY_FAILURE_TEXT;

#[derive(Default)]
struct StubSummarizer {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl Summarizer for StubSummarizer {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if text.contains("fail") {
            return Err(SummarizeError::EmptyResponse);
        }
        let first = text.split_whitespace().next().unwrap_or_default();
        Ok(format!("Title: {first}\nSummary: summary of {first}"))
    }
}

fn control_plane(stub: &Arc<StubSummarizer>, concurrency: usize) -> SummitControlPlane {
    let summarizer: Arc<dyn Summarizer> = stub.clone();
    SummitControlPlane::new(
        summarizer,
        ProcessingOptions::default().with_summary_concurrency(concurrency),
    )
}

#[tokio::test]
async fn long_sections_are_summarized_and_short_ones_copied() {
    let stub = Arc::new(StubSummarizer::default());
    let control = control_plane(&stub, 4);
    let pdf = build_pdf(&[vec![
        line(72.0, 700.0, &long_text(25, "alpha")),
        line(72.0, 500.0, "A short heading"),
    ]]);

    let result = control
        .summarize(PdfUpload::new("report.pdf", pdf))
        .await
        .expect("summarize should succeed");

    assert_eq!(result.file_name, "summarized_report.pdf");
    assert_eq!(result.report.page_count, 1);
    assert_eq!(result.report.section_count, 2);
    assert_eq!(result.report.summarized_count, 1);
    assert_eq!(result.report.failed_count, 0);
    assert_eq!(result.report.annotated_pages, 1);
    assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.sections[0].summary, "Title: alpha0\nSummary: summary of alpha0");
    assert_eq!(result.sections[1].summary, "A short heading");
    assert!(result.bytes.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn exactly_threshold_words_are_copied() {
    let stub = Arc::new(StubSummarizer::default());
    let control = control_plane(&stub, 4);
    let text = long_text(20, "w");
    let pdf = build_pdf(&[vec![line(72.0, 700.0, &text)]]);

    let result = control
        .summarize(PdfUpload::new("short.pdf", pdf))
        .await
        .expect("summarize should succeed");

    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.sections[0].summary, text);
}

#[tokio::test]
async fn failures_become_placeholder_summaries() {
    let stub = Arc::new(StubSummarizer::default());
    let control = control_plane(&stub, 2);
    let pdf = build_pdf(&[vec![
        line(72.0, 700.0, &long_text(30, "ok")),
        line(72.0, 500.0, &long_text(30, "fail")),
    ]]);

    let result = control
        .summarize(PdfUpload::new("mixed.pdf", pdf))
        .await
        .expect("summarizer failures must not fail the request");

    assert_eq!(result.report.summarized_count, 1);
    assert_eq!(result.report.failed_count, 1);
    assert_eq!(result.sections[1].summary, SUMMARY_FAILURE_TEXT);
}

#[tokio::test]
#[allow(clippy::cast_precision_loss)]
async fn concurrency_is_bounded_and_order_preserved() {
    let stub = Arc::new(StubSummarizer::default());
    let control = control_plane(&stub, 2);
    let seeds = ["a", "b", "c", "d", "e", "f"];
    let lines: Vec<_> = seeds
        .iter()
        .enumerate()
        .map(|(index, seed)| line(72.0, 750.0 - 100.0 * index as f32, &long_text(25, seed)))
        .collect();
    let pdf = build_pdf(&[lines]);

    let result = control
        .summarize(PdfUpload::new("many.pdf", pdf))
        .await
        .expect("summarize should succeed");

    assert_eq!(stub.calls.load(Ordering::SeqCst), seeds.len());
    assert!(stub.max_in_flight.load(Ordering::SeqCst) <= 2);
    for (section, seed) in result.sections.iter().zip(seeds) {
        assert_eq!(section.summary, format!("Title: {seed}0\nSummary: summary of {seed}0"));
    }
}

#[tokio::test]
async fn compress_names_output_and_reports_sizes() {
    let stub = Arc::new(StubSummarizer::default());
    let control = control_plane(&stub, 1);
    let pdf = build_pdf(&[vec![line(72.0, 700.0, &long_text(200, "text"))]]);

    let result = control
        .compress(PdfUpload::new("dir/input.pdf", pdf.clone()))
        .await
        .expect("compress should succeed");

    assert_eq!(result.file_name, "compressed_input.pdf");
    assert_eq!(result.report.original_bytes, pdf.len());
    assert_eq!(result.report.compressed_bytes, result.bytes.len());
    assert!(result.bytes.len() <= pdf.len());
}

#[tokio::test]
async fn malformed_upload_is_a_client_error() {
    let stub = Arc::new(StubSummarizer::default());
    let control = control_plane(&stub, 1);

    let err = control
        .summarize(PdfUpload::new("bad.pdf", b"%PDF-1.4 broken".to_vec()))
        .await
        .expect_err("broken pdf should fail");

    assert!(err.is_client_error());
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn summarize_runs_on_spawned_tasks() {
    let stub = Arc::new(StubSummarizer::default());
    let control = control_plane(&stub, 2);
    let pdf = build_pdf(&[vec![line(72.0, 700.0, &long_text(30, "spawned"))]]);

    let summarize = tokio::spawn({
        let control = control.clone();
        let pdf = pdf.clone();
        async move { control.summarize(PdfUpload::new("spawned.pdf", pdf)).await }
    });
    let compress = tokio::spawn(async move { control.compress(PdfUpload::new("spawned.pdf", pdf)).await });

    let summarized = summarize
        .await
        .expect("summarize task should join")
        .expect("summarize should succeed");
    let compressed = compress
        .await
        .expect("compress task should join")
        .expect("compress should succeed");
    assert_eq!(summarized.report.summarized_count, 1);
    assert_eq!(compressed.file_name, "compressed_spawned.pdf");
}

#[tokio::test]
async fn single_worker_serializes_concurrent_requests() {
    let stub = Arc::new(StubSummarizer::default());
    let summarizer: Arc<dyn Summarizer> = stub.clone();
    let control = SummitControlPlane::new(summarizer, ProcessingOptions::default().with_pdf_workers(1));
    let pdf = build_pdf(&[vec![line(72.0, 700.0, "short text")]]);

    let (first, second) = tokio::join!(
        control.compress(PdfUpload::new("one.pdf", pdf.clone())),
        control.summarize(PdfUpload::new("two.pdf", pdf)),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
}
