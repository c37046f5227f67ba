// src/pdf_extract.rs

use crate::error::ExtractionError;
use async_trait::async_trait;
use lopdf::Document;
use tracing::{info, warn};

/// The text-extraction collaborator. Implementations may block on IO or
/// remote services; the batch layer wraps calls in a timeout.
///
/// An empty or whitespace-only result is a valid (if unhelpful) return,
/// not an error.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, document: &[u8]) -> Result<String, ExtractionError>;
}

/// Minimum number of non-whitespace characters we expect from a
/// "real" text PDF. Below this threshold we treat it as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// PDF implementation backed by lopdf (structural checks) and
/// pdf-extract (text layer).
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, document: &[u8]) -> Result<String, ExtractionError> {
        // --- Phase 1: structural check with lopdf ---
        let doc = Document::load_mem(document)
            .map_err(|e| ExtractionError::Parse(format!("failed to parse PDF: {e}")))?;

        if looks_like_scanned(&doc) {
            info!("PDF structural check: likely scanned / image-only");
            return Err(ExtractionError::ScannedImage);
        }

        // --- Phase 2: attempt full text extraction ---
        match pdf_extract::extract_text_from_mem(document) {
            Ok(text) => {
                let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
                if meaningful < MIN_TEXT_CHARS {
                    info!(
                        chars = meaningful,
                        "Extracted text too short, treating as scanned"
                    );
                    Err(ExtractionError::ScannedImage)
                } else {
                    info!(chars = meaningful, "Text extracted successfully");
                    Ok(text)
                }
            }
            Err(e) => {
                warn!(error = %e, "pdf-extract failed, may be scanned or corrupted");
                Err(ExtractionError::ScannedImage)
            }
        }
    }
}

/// Heuristic: inspect the PDF object tree for signs that every page
/// is just a single image with no text operators.
///
/// We look at each page's `Resources` dictionary. If a page has
/// XObject images but **no** Font resources, it's almost certainly
/// a scanned page.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // Can't tell, let text extraction try
    }

    let mut image_only_pages = 0;

    for (_page_num, object_id) in &pages {
        let Ok(page_obj) = doc.get_object(*object_id) else {
            continue;
        };
        let Some(page_dict) = page_obj.as_dict().ok() else {
            continue;
        };

        let has_fonts = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .and_then(|res| res.get(b"Font").ok())
            .and_then(|f| doc.dereference(f).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .is_some_and(|fonts| !fonts.is_empty());

        let has_images = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|x| doc.dereference(x).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .is_some_and(|xobjs| !xobjs.is_empty());

        if has_images && !has_fonts {
            image_only_pages += 1;
        }
    }

    let total = pages.len();
    let ratio = image_only_pages as f64 / total as f64;
    info!(
        total_pages = total,
        image_only = image_only_pages,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    // If ≥80% of pages are image-only, treat the whole PDF as scanned
    ratio >= 0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn garbage_bytes_are_a_parse_error() {
        let result = PdfTextExtractor.extract_text(b"this is not a pdf").await;
        assert!(matches!(result, Err(ExtractionError::Parse(_))));
    }
}
