// src/pdf_check.rs

use crate::error::{DocParseError, Result};
use lopdf::Document;
use tracing::{info, warn};

/// Readers accept the header anywhere in this many leading bytes.
const HEADER_WINDOW: usize = 1024;

/// Confirm the bytes look like a PDF before paying for a service call.
///
/// Only a missing `%PDF-` header is fatal. Returns the page count lopdf
/// sees, or `None` when lopdf cannot open a file the service may still
/// read.
pub fn check_pdf(pdf_bytes: &[u8]) -> Result<Option<usize>> {
    let window = &pdf_bytes[..pdf_bytes.len().min(HEADER_WINDOW)];
    if !window.windows(5).any(|w| w == b"%PDF-") {
        return Err(DocParseError::NotPdf("missing %PDF- header".to_string()));
    }

    match Document::load_mem(pdf_bytes) {
        Ok(doc) => {
            let pages = doc.get_pages().len();
            info!(pages, "PDF structural check passed");
            Ok(Some(pages))
        }
        Err(e) => {
            warn!(error = %e, "lopdf could not parse PDF, sending it anyway");
            Ok(None)
        }
    }
}
