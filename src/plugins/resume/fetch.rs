//! PDF download and text extraction.

use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Download timeout sized for large hosted files.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Desktop user agent; some file hosts refuse the default.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Download a PDF from `url` and verify it actually is one.
///
/// Detection order: magic bytes are authoritative; the `Content-Type`
/// header and a `.pdf` URL suffix are accepted next; a hosted-file-provider
/// URL with a filename in `Content-Disposition` is the hint of last resort.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the download fails or the body is not
/// recognisably a PDF.
pub async fn download_pdf(url: &str) -> Result<Vec<u8>> {
    info!(url, "downloading PDF");

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Validation {
            field: "pdf_url".to_owned(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Validation {
            field: "pdf_url".to_owned(),
            reason: format!("Failed to download PDF from {url}: {e}"),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Validation {
            field: "pdf_url".to_owned(),
            reason: format!("Failed to download PDF from {url}: HTTP {status}"),
        });
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();
    let content_disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();

    let body = response.bytes().await.map_err(|e| Error::Validation {
        field: "pdf_url".to_owned(),
        reason: format!("Failed to read PDF body from {url}: {e}"),
    })?;

    let has_magic = body.starts_with(PDF_MAGIC);
    let is_pdf = has_magic
        || content_type.contains("application/pdf")
        || url.to_lowercase().ends_with(".pdf")
        || (url.contains("airtableusercontent.com")
            && (content_disposition.contains(".pdf") || content_disposition.contains("filename")));

    if !is_pdf {
        warn!(url, content_type = %content_type, "downloaded content is not a PDF");
        return Err(Error::Validation {
            field: "pdf_url".to_owned(),
            reason: format!(
                "Content at {url} is not a PDF (Content-Type: {content_type})"
            ),
        });
    }

    if !has_magic {
        debug!(url, "PDF accepted without magic bytes (header/suffix hint)");
    }

    Ok(body.to_vec())
}

/// Extract text from PDF bytes.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the extractor cannot process the
/// document.
pub fn extract_text_from_pdf(pdf_content: &[u8]) -> Result<String> {
    info!("extracting text from PDF");

    let text = pdf_extract::extract_text_from_mem(pdf_content).map_err(|e| Error::Validation {
        field: "pdf_content".to_owned(),
        reason: format!("Failed to extract text from PDF: {e}"),
    })?;

    if text.trim().chars().count() < 10 {
        warn!(chars = text.len(), "extracted very little text");
    }

    let cleaned = clean_text(&text);
    info!(text_length = cleaned.len(), "text extraction successful");
    Ok(cleaned)
}

/// Collapse runs of blank lines and spaces and drop non-printable characters.
pub fn clean_text(text: &str) -> String {
    let mut collapsed = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect::<String>();

    if let Ok(newline_re) = Regex::new(r"\n{3,}") {
        collapsed = newline_re.replace_all(&collapsed, "\n\n").into_owned();
    }
    if let Ok(space_re) = Regex::new(r" {2,}") {
        collapsed = space_re.replace_all(&collapsed, " ").into_owned();
    }

    collapsed.trim().to_owned()
}
