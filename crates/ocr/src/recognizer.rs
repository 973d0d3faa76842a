use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("OCR service answered HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// One recognized page of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub index: usize,
    pub markdown: String,
}

/// Abstraction over an OCR service.
/// Implementations take a base64-encoded image and return its pages as markdown.
pub trait OcrBackend: Send + Sync {
    fn recognize(
        &self,
        image_base64: &str,
    ) -> impl Future<Output = Result<Vec<OcrPage>, OcrError>> + Send;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns pre-set pages regardless of the image.
pub struct MockRecognizer {
    pub pages: Vec<String>,
}

impl MockRecognizer {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self { pages: vec![markdown.into()] }
    }

    pub fn with_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { pages: pages.into_iter().map(Into::into).collect() }
    }
}

impl OcrBackend for MockRecognizer {
    async fn recognize(&self, _image_base64: &str) -> Result<Vec<OcrPage>, OcrError> {
        Ok(self
            .pages
            .iter()
            .enumerate()
            .map(|(index, markdown)| OcrPage { index, markdown: markdown.clone() })
            .collect())
    }
}

// ── Mistral OCR backend ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: OcrDocument,
    include_image_base64: bool,
}

#[derive(Serialize)]
struct OcrDocument {
    #[serde(rename = "type")]
    kind: &'static str,
    image_url: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
}

/// Client for Mistral's document OCR endpoint, which answers in markdown.
pub struct MistralRecognizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl MistralRecognizer {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn request_body<'a>(&'a self, image_base64: &str) -> OcrRequest<'a> {
        OcrRequest {
            model: &self.model,
            document: OcrDocument {
                kind: "image_url",
                image_url: format!("data:image/jpeg;base64,{image_base64}"),
            },
            include_image_base64: false,
        }
    }
}

impl OcrBackend for MistralRecognizer {
    async fn recognize(&self, image_base64: &str) -> Result<Vec<OcrPage>, OcrError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(image_base64))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Status { status: status.as_u16(), body });
        }

        let parsed: OcrResponse = response.json().await?;
        Ok(parsed.pages)
    }
}
