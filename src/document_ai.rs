// src/document_ai.rs

use crate::auth::TokenSource;
use crate::config::{Config, DocumentAiConfig};
use crate::error::{DocParseError, Result};
use crate::response::ProcessResponse;
use crate::retry::RetryPolicy;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

const PDF_MIME: &str = "application/pdf";

/// Upper bound for the doubling backoff between attempts.
const MAX_BACKOFF_MS: u64 = 10_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    raw_document: RawDocument<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument<'a> {
    content: String,
    mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    details: Option<Value>,
}

/// Calls a single Document AI processor over REST.
pub struct DocumentAiClient {
    http: Client,
    cfg: DocumentAiConfig,
    tokens: TokenSource,
    retry: RetryPolicy,
}

/// Pin rustls to ring so TLS setup does not depend on which provider
/// features the dependency graph happens to enable. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

impl DocumentAiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        install_crypto_provider();
        let dai = &cfg.document_ai;
        let http = Client::builder()
            .timeout(Duration::from_secs(dai.timeout_secs))
            .build()?;
        Ok(Self {
            tokens: TokenSource::new(cfg, http.clone()),
            retry: RetryPolicy::new(dai.max_retries, dai.initial_backoff_ms, MAX_BACKOFF_MS),
            cfg: dai.clone(),
            http,
        })
    }

    /// Send one PDF to the processor and decode the returned document.
    pub async fn process_pdf(&self, pdf_bytes: &[u8]) -> Result<ProcessResponse> {
        let url = self.cfg.process_url()?;
        let body = ProcessRequest {
            raw_document: RawDocument {
                content: BASE64.encode(pdf_bytes),
                mime_type: PDF_MIME,
            },
        };

        info!(
            processor = %self.cfg.processor_id,
            location = %self.cfg.location,
            pdf_bytes = pdf_bytes.len(),
            "Sending PDF to Document AI"
        );

        self.retry
            .retry("documentai.process", || self.send(&url, &body))
            .await
    }

    async fn send(&self, url: &str, body: &ProcessRequest<'_>) -> Result<ProcessResponse> {
        let token = self.tokens.bearer().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Document AI request failed");
            return Err(service_error(status.as_u16(), &text));
        }

        let text = response.text().await?;
        let parsed: ProcessResponse = serde_json::from_str(&text)?;
        info!(
            entities = parsed.entities().len(),
            pages = parsed.page_count(),
            "Document AI response received"
        );
        Ok(parsed)
    }
}

/// Prefer the structured `error.details`, then `error.message`, then the raw body.
fn service_error(status: u16, body: &str) -> DocParseError {
    let details = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorBody {
                details: Some(details),
                ..
            },
        }) if !details.is_null() && details.as_array().is_none_or(|d| !d.is_empty()) => {
            details.to_string()
        }
        Ok(ErrorEnvelope {
            error: ErrorBody {
                message: Some(message),
                ..
            },
        }) => message,
        _ => body.trim().to_string(),
    };
    DocParseError::Service { status, details }
}
