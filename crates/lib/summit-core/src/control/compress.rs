use summit_model::CompressionReport;
use summit_model::defaults::compressed_file_name;

use crate::pdf::compress_pdf;

use super::{ControlError, PdfUpload, SummitControlPlane};

/// A compressed document ready to return to the caller.
#[derive(Debug, Clone)]
pub struct CompressedPdf {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: CompressionReport,
}

impl SummitControlPlane {
    /// Compresses an uploaded PDF.
    ///
    /// # Errors
    /// Returns `ControlError` if the PDF cannot be processed or the worker
    /// task fails.
    pub async fn compress(&self, upload: PdfUpload) -> Result<CompressedPdf, ControlError> {
        let PdfUpload { file_name, bytes } = upload;
        let options = self.options.compress.clone();
        let output = self.run_blocking(move || compress_pdf(&bytes, &options)).await?;
        Ok(CompressedPdf {
            file_name: compressed_file_name(&file_name),
            bytes: output.bytes,
            report: output.report,
        })
    }
}
