// src/pipeline.rs

use crate::document_ai::DocumentAiClient;
use crate::document_db::{DocumentStore, StoredDocument};
use crate::error::Result;
use crate::heuristics::{self, ParseResult};
use crate::pdf_check::check_pdf;
use crate::response::ProcessResponse;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{Instrument, info, info_span, warn};

/// Anything that turns PDF bytes into a Document AI style response.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self, pdf_bytes: &[u8]) -> Result<ProcessResponse>;
}

#[async_trait]
impl DocumentProcessor for DocumentAiClient {
    async fn process(&self, pdf_bytes: &[u8]) -> Result<ProcessResponse> {
        self.process_pdf(pdf_bytes).await
    }
}

/// PDF gate -> processor -> line-item reconstruction -> history.
pub struct Pipeline {
    processor: Arc<dyn DocumentProcessor>,
    store: Arc<Mutex<DocumentStore>>,
    reuse_cached: bool,
}

impl Pipeline {
    pub fn new(
        processor: Arc<dyn DocumentProcessor>,
        store: Arc<Mutex<DocumentStore>>,
        reuse_cached: bool,
    ) -> Self {
        Self {
            processor,
            store,
            reuse_cached,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<DocumentStore>> {
        &self.store
    }

    pub async fn parse(&self, filename: &str, pdf_bytes: &[u8]) -> Result<ParseResult> {
        let span = info_span!("parse", filename = %filename);
        self.parse_inner(filename, pdf_bytes).instrument(span).await
    }

    async fn parse_inner(&self, filename: &str, pdf_bytes: &[u8]) -> Result<ParseResult> {
        let local_pages = check_pdf(pdf_bytes)?;
        let sha256 = DocumentStore::content_hash(pdf_bytes);

        if self.reuse_cached {
            match self.store.lock().await.find_by_hash(&sha256) {
                Ok(Some(stored)) => {
                    info!(document_id = ?stored.id, "Identical PDF already processed, reusing result");
                    return Ok(stored.result);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "History lookup failed, processing anyway"),
            }
        }

        let response = self.processor.process(pdf_bytes).await?;
        let result = heuristics::extract_line_items(&response);
        if let Some(local_pages) =
            local_pages.filter(|&n| n != result.document_metadata.page_count)
        {
            info!(
                local_pages,
                service_pages = result.document_metadata.page_count,
                "Page count differs from local parse"
            );
        }

        let doc = StoredDocument {
            id: None,
            filename: filename.to_string(),
            sha256,
            result,
            created_at: None,
        };
        self.record(&doc).await;
        Ok(doc.result)
    }

    /// Write the result to history. Failures are logged, never returned.
    ///
    /// The store lock is not held across the service call, so identical
    /// uploads in flight together can both reach the processor. The
    /// second one to finish finds the first row and skips its insert.
    async fn record(&self, doc: &StoredDocument) {
        let store = self.store.lock().await;
        if self.reuse_cached {
            match store.find_by_hash(&doc.sha256) {
                Ok(Some(existing)) => {
                    info!(document_id = ?existing.id, "Identical PDF stored meanwhile, skipping insert");
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "History lookup failed, result not stored");
                    return;
                }
            }
        }
        if let Err(e) = store.insert_document(doc) {
            warn!(error = %e, "Failed to store result");
        }
    }
}
