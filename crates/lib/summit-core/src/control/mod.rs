use std::sync::atomic::{AtomicBool, Ordering};
use std::{error::Error, fmt, sync::Arc};

use summit_model::defaults::{PDF_WORKERS, SUMMARY_CONCURRENCY, SUMMARY_MIN_WORDS};
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinError;

use crate::pdf::{AnnotateOptions, CompressOptions, ExtractOptions, PdfError};
use crate::summarize::Summarizer;

pub mod compress;
pub mod summarize;

pub use compress::CompressedPdf;
pub use summarize::SummarizedPdf;

#[derive(Debug)]
pub enum ControlError {
    Pdf(PdfError),
    Task(String),
    Cancelled,
}

impl ControlError {
    /// True when the request should be answered with a client error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        match self {
            Self::Pdf(err) => err.is_client_error(),
            Self::Task(_) | Self::Cancelled => false,
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf(err) => write!(f, "{err}"),
            Self::Task(message) => write!(f, "processing task failed: {message}"),
            Self::Cancelled => write!(f, "processing was cancelled"),
        }
    }
}

impl Error for ControlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Pdf(err) => Some(err),
            Self::Task(_) | Self::Cancelled => None,
        }
    }
}

impl From<PdfError> for ControlError {
    fn from(err: PdfError) -> Self {
        Self::Pdf(err)
    }
}

impl From<JoinError> for ControlError {
    fn from(err: JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

impl From<AcquireError> for ControlError {
    fn from(err: AcquireError) -> Self {
        Self::Task(err.to_string())
    }
}

/// An uploaded document.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl PdfUpload {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Tuning for both processing pipelines.
#[derive(Debug, Clone)]
pub struct ProcessingOptions {
    pub compress: CompressOptions,
    pub extract: ExtractOptions,
    pub annotate: AnnotateOptions,
    /// Sections with more words than this are sent to the summarizer.
    pub summary_min_words: usize,
    pub summary_concurrency: usize,
    /// Blocking PDF jobs allowed to run at once across all requests.
    pub pdf_workers: usize,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            compress: CompressOptions::default(),
            extract: ExtractOptions::default(),
            annotate: AnnotateOptions::default(),
            summary_min_words: SUMMARY_MIN_WORDS,
            summary_concurrency: SUMMARY_CONCURRENCY,
            pdf_workers: PDF_WORKERS,
        }
    }
}

impl ProcessingOptions {
    #[must_use]
    pub fn with_compress(mut self, compress: CompressOptions) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn with_annotate(mut self, annotate: AnnotateOptions) -> Self {
        self.annotate = annotate;
        self
    }

    #[must_use]
    pub const fn with_summary_min_words(mut self, words: usize) -> Self {
        self.summary_min_words = words;
        self
    }

    #[must_use]
    pub const fn with_summary_concurrency(mut self, concurrency: usize) -> Self {
        self.summary_concurrency = concurrency;
        self
    }

    #[must_use]
    pub const fn with_pdf_workers(mut self, workers: usize) -> Self {
        self.pdf_workers = workers;
        self
    }
}

/// Entry point for compress and summarize requests.
#[derive(Clone)]
pub struct SummitControlPlane {
    summarizer: Arc<dyn Summarizer>,
    options: Arc<ProcessingOptions>,
    workers: Arc<Semaphore>,
}

impl fmt::Debug for SummitControlPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummitControlPlane")
            .field("summarizer", &self.summarizer.name())
            .field("options", &self.options)
            .field("idle_workers", &self.workers.available_permits())
            .finish()
    }
}

impl SummitControlPlane {
    #[must_use]
    pub fn new(summarizer: Arc<dyn Summarizer>, options: ProcessingOptions) -> Self {
        let workers = Arc::new(Semaphore::new(options.pdf_workers.max(1)));
        Self {
            summarizer,
            options: Arc::new(options),
            workers,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    #[must_use]
    pub fn summarizer_name(&self) -> &'static str {
        self.summarizer.name()
    }

    /// Runs a PDF job on the blocking pool once a worker slot is free.
    ///
    /// Dropping the returned future before the job starts (for example on a
    /// request timeout) releases the slot and the job is skipped.
    async fn run_blocking<T, F>(&self, job: F) -> Result<T, ControlError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, PdfError> + Send + 'static,
    {
        let permit = Arc::clone(&self.workers).acquire_owned().await?;
        let guard = CancelOnDrop::default();
        let cancelled = Arc::clone(&guard.0);
        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            if cancelled.load(Ordering::Acquire) {
                return Err(ControlError::Cancelled);
            }
            job().map_err(ControlError::from)
        })
        .await?;
        drop(guard);
        output
    }
}

/// Flags a blocking job as cancelled when the awaiting future goes away.
#[derive(Default)]
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}
