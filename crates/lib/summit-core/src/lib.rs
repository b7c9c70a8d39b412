//! Core processing for summit.
//!
//! This crate owns the PDF engine (compression, positioned text extraction and
//! margin annotation), the summarizer clients, and the control plane that
//! ties them into the compress and summarize pipelines.

pub mod control;
pub mod pdf;
pub mod summarize;

pub use control::{
    CompressedPdf, ControlError, PdfUpload, ProcessingOptions, SummarizedPdf, SummitControlPlane,
};
pub use summarize::{LeadSentenceSummarizer, SummarizeError, Summarizer};
