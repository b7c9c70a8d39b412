pub const UPLOAD_FIELD: &str = "pdf_file";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const PDF_EXTENSION: &str = ".pdf";
pub const PDF_HEADER: &[u8] = b"%PDF-";
pub const PDF_HEADER_SCAN_BYTES: usize = 1024;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const SUMMARY_MIN_WORDS: usize = 20;
pub const SUMMARY_CONCURRENCY: usize = 4;
pub const PDF_WORKERS: usize = 4;
pub const SUMMARY_FAILURE_TEXT: &str = "Error generating summary";
pub const LINE_MERGE_TOLERANCE: f32 = 20.0;

pub const IMAGE_MAX_DIMENSION: u32 = 1600;
pub const JPEG_QUALITY: u8 = 60;
pub const MARGIN_WIDTH: f32 = 180.0;

pub const PRODUCER: &str = "summit";

pub const COMPRESSED_PREFIX: &str = "compressed_";
pub const SUMMARIZED_PREFIX: &str = "summarized_";

#[must_use]
pub fn compressed_file_name(file_name: &str) -> String {
    prefixed_file_name(COMPRESSED_PREFIX, file_name)
}

#[must_use]
pub fn summarized_file_name(file_name: &str) -> String {
    prefixed_file_name(SUMMARIZED_PREFIX, file_name)
}

/// Builds a download name, keeping only the final path component and
/// stripping characters that would break a quoted header value.
fn prefixed_file_name(prefix: &str, file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|ch| !ch.is_control() && *ch != '"')
        .collect::<String>();
    let base = base.trim();
    if base.is_empty() {
        format!("{prefix}document.pdf")
    } else {
        format!("{prefix}{base}")
    }
}

/// Returns true when the name carries a `.pdf` extension, ignoring case.
#[must_use]
pub fn has_pdf_extension(file_name: &str) -> bool {
    let name = file_name.trim();
    name.len() > PDF_EXTENSION.len()
        && name
            .get(name.len() - PDF_EXTENSION.len()..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
}

/// Returns true when a `%PDF-` header appears within the first kilobyte.
#[must_use]
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_HEADER_SCAN_BYTES)];
    window
        .windows(PDF_HEADER.len())
        .any(|candidate| candidate == PDF_HEADER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_names_strip_paths_and_quotes() {
        assert_eq!(compressed_file_name("report.pdf"), "compressed_report.pdf");
        assert_eq!(
            summarized_file_name("C:\\Users\\me\\q\"3\".pdf"),
            "summarized_q3.pdf"
        );
        assert_eq!(compressed_file_name("   "), "compressed_document.pdf");
    }

    #[test]
    fn pdf_extension_is_case_insensitive() {
        assert!(has_pdf_extension("paper.PDF"));
        assert!(has_pdf_extension("paper.pdf "));
        assert!(!has_pdf_extension(".pdf"));
        assert!(!has_pdf_extension("paper.pdf.exe"));
        assert!(!has_pdf_extension("notes.txt"));
    }

    #[test]
    fn sniffing_accepts_leading_garbage_within_window() {
        assert!(looks_like_pdf(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3"));
        let mut padded = vec![b' '; 100];
        padded.extend_from_slice(b"%PDF-1.4");
        assert!(looks_like_pdf(&padded));

        let mut late = vec![0_u8; PDF_HEADER_SCAN_BYTES];
        late.extend_from_slice(b"%PDF-1.4");
        assert!(!looks_like_pdf(&late));
        assert!(!looks_like_pdf(b"PK\x03\x04"));
        assert!(!looks_like_pdf(b""));
    }
}
