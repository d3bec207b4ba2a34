//! Turning uploaded files into plain text.
//!
//! Text-like files are decoded as UTF-8 (lossy). PDFs need the `pdf` feature,
//! which binds to the system pdfium library at runtime.

use super::ProviderError;

pub trait DocumentExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8], filename: &str) -> Result<String, ProviderError>;
}

/// Picks a decoder from the file extension.
#[derive(Debug, Clone, Default)]
pub struct FileExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Pdf,
    Text,
}

fn kind_of(filename: &str) -> DocumentKind {
    if filename.to_lowercase().ends_with(".pdf") {
        DocumentKind::Pdf
    } else {
        DocumentKind::Text
    }
}

impl DocumentExtractor for FileExtractor {
    fn extract_text(&self, bytes: &[u8], filename: &str) -> Result<String, ProviderError> {
        match kind_of(filename) {
            DocumentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
            DocumentKind::Pdf => extract_pdf(bytes, filename),
        }
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8], filename: &str) -> Result<String, ProviderError> {
    use pdfium_render::prelude::*;

    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| ProviderError::Other(format!("pdfium library unavailable: {e:?}")))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ProviderError::InvalidResponse(format!("{filename}: {e:?}")))?;

    let mut text = String::new();
    for page in document.pages().iter() {
        let page_text = page
            .text()
            .map_err(|e| ProviderError::InvalidResponse(format!("{filename}: {e:?}")))?;
        text.push_str(&page_text.all());
        text.push('\n');
    }

    Ok(text)
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8], filename: &str) -> Result<String, ProviderError> {
    Err(ProviderError::Unsupported(format!(
        "{filename} (built without pdf support)"
    )))
}
