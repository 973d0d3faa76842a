use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use splitty_core::{Config, ConfigError, CurrencyCode, LineItem};
use splitty_fx::{is_converted, CurrencyResolver, ExchangeRateHost, RateProvider};
use std::path::Path;
use thiserror::Error;

use crate::recognizer::{MistralRecognizer, OcrBackend, OcrPage};
use crate::table::TableParser;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No text could be recognized in the image")]
    NothingRecognized,
}

/// The result of a single receipt processing run.
#[derive(Debug, Clone)]
pub struct ProcessedReceipt {
    /// Parsed items, with converted amounts when conversion succeeded.
    pub items: Vec<LineItem>,
    pub source_currency: CurrencyCode,
    pub target_currency: CurrencyCode,
    /// All recognized pages, joined with newlines.
    pub raw_markdown: String,
    /// Table rows that were dropped while parsing.
    pub skipped_rows: usize,
}

impl ProcessedReceipt {
    pub fn converted(&self) -> bool {
        is_converted(&self.items)
    }
}

/// Orchestrates: OCR → table parse → currency detection → conversion.
pub struct ReceiptPipeline<R, P> {
    recognizer: R,
    resolver: CurrencyResolver<P>,
}

impl<R: OcrBackend, P: RateProvider> ReceiptPipeline<R, P> {
    pub fn new(recognizer: R, resolver: CurrencyResolver<P>) -> Self {
        Self { recognizer, resolver }
    }

    pub fn resolver(&self) -> &CurrencyResolver<P> {
        &self.resolver
    }

    /// Read an image from disk and process it.
    pub async fn process_file(
        &self,
        path: &Path,
        target: &CurrencyCode,
    ) -> Result<ProcessedReceipt, PipelineError> {
        let image_base64 = encode_image(path).await?;
        self.process(&image_base64, target).await
    }

    /// Process a base64-encoded image.
    pub async fn process(
        &self,
        image_base64: &str,
        target: &CurrencyCode,
    ) -> Result<ProcessedReceipt, PipelineError> {
        // A failed call and an empty document are the same outcome here.
        let pages = match self.recognizer.recognize(image_base64).await {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(error = %e, "OCR recognition failed");
                Vec::new()
            }
        };
        self.process_pages(pages, target).await
    }

    /// Run the text stages over already-recognized pages.
    pub async fn process_pages(
        &self,
        pages: Vec<OcrPage>,
        target: &CurrencyCode,
    ) -> Result<ProcessedReceipt, PipelineError> {
        if pages.is_empty() {
            return Err(PipelineError::NothingRecognized);
        }

        let mut items = Vec::new();
        let mut skipped_rows = 0;
        for page in &pages {
            let report = TableParser::parse_report(&page.markdown);
            tracing::info!(
                page = page.index,
                items = report.items.len(),
                skipped = report.skipped.len(),
                "parsed receipt page"
            );
            skipped_rows += report.skipped.len();
            items.extend(report.items);
        }

        let raw_markdown = pages
            .iter()
            .map(|p| p.markdown.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let source_currency = self.resolver.detect(&raw_markdown);
        let items = self.resolver.convert(items, &source_currency, target).await;

        Ok(ProcessedReceipt {
            items,
            source_currency,
            target_currency: target.clone(),
            raw_markdown,
            skipped_rows,
        })
    }
}

impl ReceiptPipeline<MistralRecognizer, ExchangeRateHost> {
    /// Builds the HTTP-backed pipeline. Fails before any network call when the
    /// OCR key is missing; a missing rate key only disables conversion.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let ocr_key = config.ocr.require_api_key()?;
        let client = reqwest::Client::new();

        let recognizer = MistralRecognizer::new(
            client.clone(),
            config.ocr.endpoint.as_str(),
            config.ocr.model.as_str(),
            ocr_key,
        );

        let resolver = match config.rates.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => CurrencyResolver::new(ExchangeRateHost::new(
                client,
                config.rates.endpoint.as_str(),
                key,
            )),
            None => {
                tracing::warn!("EXCHANGE_API_KEY not configured, currency conversion disabled");
                CurrencyResolver::without_provider()
            }
        };

        Ok(Self::new(recognizer, resolver))
    }
}

/// Base64-encode an image file for the OCR service.
pub async fn encode_image(path: &Path) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(STANDARD.encode(bytes))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
