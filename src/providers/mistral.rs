//! The Mistral OCR API adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::sleep;

use super::{OcrProvider, OcrText};
use crate::{
    config::RunConfig,
    data_url::{data_url, document_mime_type, image_mime_type, is_raster_image},
    prelude::*,
    retry::RetryClass,
};

/// The OCR endpoint we submit documents to.
const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1/ocr";

/// The OCR model to request.
const MISTRAL_MODEL: &str = "mistral-ocr-latest";

/// A minimal valid PDF, used to probe API availability.
const MINIMAL_TEST_PDF: &str =
    "JVBERi0xLjQKJcOkw7zDssOMCjEgMCBvYmoKPDwKL1R5cGUgL0NhdGFsb2cKL1BhZ2VzIDIgMCBSCj4+CmVuZG9iago=";

/// Client for the Mistral OCR API.
pub struct MistralOcr {
    client: reqwest::Client,
    api_key: String,
    include_images: bool,
    max_retries: u32,
    retry_delay: std::time::Duration,
    request_timeout: std::time::Duration,
}

impl MistralOcr {
    pub fn new(config: &RunConfig) -> MistralOcr {
        MistralOcr {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            include_images: config.include_images,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            request_timeout: config.request_timeout,
        }
    }

    /// Build the request payload for `path`. Raster images are embedded as
    /// `image_url` data URIs with their real image MIME type; everything
    /// else goes in as a `document_url`.
    fn build_request(&self, path: &Path, bytes: &[u8]) -> OcrRequest {
        let extension = lowercase_extension(path);
        let document = if is_raster_image(&extension) {
            DocumentSource::ImageUrl {
                image_url: data_url(image_mime_type(&extension), bytes),
            }
        } else {
            DocumentSource::DocumentUrl {
                document_url: data_url(document_mime_type(&extension), bytes),
            }
        };
        OcrRequest {
            model: MISTRAL_MODEL,
            document,
            include_image_base64: self.include_images,
        }
    }

    /// Submit one request, without retries.
    async fn submit(&self, request: &OcrRequest) -> Result<String, AttemptError> {
        let response = self
            .client
            .post(MISTRAL_API_URL)
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await
            .map_err(|err| AttemptError {
                class: RetryClass::of_request_error(&err),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError {
                class: RetryClass::of_status(status),
                message: format!("API returned {}: {}", status, body),
            });
        }

        response.text().await.map_err(|err| AttemptError {
            class: RetryClass::Transient,
            message: format!("failed to read API response: {}", err),
        })
    }
}

#[async_trait::async_trait]
impl OcrProvider for MistralOcr {
    fn name(&self) -> &'static str {
        "Mistral OCR"
    }

    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    async fn extract(&self, path: &Path) -> Result<Option<OcrText>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                error!("failed to read {}: {}", path.display(), err);
                return Ok(None);
            }
        };
        if bytes.len() > 10 * 1024 * 1024 {
            warn!(
                "large file: {} ({:.1} MB)",
                path.display(),
                bytes.len() as f64 / (1024.0 * 1024.0)
            );
        }
        let request = self.build_request(path, &bytes);

        for attempt in 1..=self.max_retries {
            debug!(
                "processing {} (attempt {}/{})",
                path.display(),
                attempt,
                self.max_retries
            );
            match self.submit(&request).await {
                Ok(body) => {
                    info!("successfully processed {}", path.display());
                    return Ok(extract_text_from_response(&body));
                }
                Err(err) => {
                    // Bad requests will never succeed; stop immediately and
                    // let the pipeline try the fallback provider.
                    let Some(wait) = err.class.backoff(self.retry_delay, attempt)
                    else {
                        error!("bad request for {}: {}", path.display(), err.message);
                        return Ok(None);
                    };
                    if err.class == RetryClass::RateLimited {
                        warn!(
                            "rate limit hit for {}; waiting {:?}",
                            path.display(),
                            wait
                        );
                        sleep(wait).await;
                    } else {
                        warn!(
                            "API error for {} (attempt {}): {}",
                            path.display(),
                            attempt,
                            err.message
                        );
                        if attempt < self.max_retries {
                            sleep(wait).await;
                        }
                    }
                }
            }
        }

        error!(
            "failed to process {} after {} attempts",
            path.display(),
            self.max_retries
        );
        Ok(None)
    }

    /// Probe the API with a minimal document. Any successful response means
    /// the service is reachable and our credentials work.
    async fn check_available(&self) -> bool {
        let request = OcrRequest {
            model: MISTRAL_MODEL,
            document: DocumentSource::DocumentUrl {
                document_url: format!(
                    "data:application/pdf;base64,{}",
                    MINIMAL_TEST_PDF
                ),
            },
            include_image_base64: false,
        };
        match self.submit(&request).await {
            Ok(_) => {
                info!("API connection test successful");
                true
            }
            Err(err) if err.message.contains("401 Unauthorized") => {
                error!("API authentication failed - check your MISTRAL_API_KEY");
                false
            }
            Err(err) => {
                error!("API connection test failed: {}", err.message);
                false
            }
        }
    }
}

/// A failed request attempt, with its retry classification.
struct AttemptError {
    class: RetryClass,
    message: String,
}

/// Lowercase extension of `path`, or an empty string.
fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Request body for the OCR endpoint.
#[derive(Debug, Serialize)]
struct OcrRequest {
    model: &'static str,
    document: DocumentSource,
    include_image_base64: bool,
}

/// The document payload: an inline data URI, tagged by kind.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DocumentSource {
    DocumentUrl { document_url: String },
    ImageUrl { image_url: String },
}

/// Response schema for the OCR endpoint. Every field is optional: the
/// provider's response shape has drifted before, so we parse it as an
/// ordered fall-through rather than trusting any single field to exist.
#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(default)]
    pages: Vec<OcrPage>,
    document_annotation: Option<String>,
    content: Option<String>,
    text: Option<String>,
}

/// One page of OCR output. Text fields in priority order.
#[derive(Debug, Deserialize)]
struct OcrPage {
    markdown: Option<String>,
    text: Option<String>,
    content: Option<String>,
}

impl OcrPage {
    fn text_field(&self) -> Option<&str> {
        self.markdown
            .as_deref()
            .or(self.text.as_deref())
            .or(self.content.as_deref())
    }
}

/// Pull text out of an OCR response body.
///
/// Priority order: per-page `markdown`/`text`/`content` joined with blank
/// lines, then `document_annotation`, then top-level `content` or `text`,
/// then a field-by-field reparse of the raw JSON, then the raw body itself.
fn extract_text_from_response(body: &str) -> Option<OcrText> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            debug!("OCR response is not JSON ({}); using raw body", err);
            return non_empty(body)
                .map(|text| OcrText::unpaged("Mistral OCR", text.to_owned()));
        }
    };

    if let Ok(response) = OcrResponse::deserialize(&value) {
        if !response.pages.is_empty() {
            let pages: Vec<String> = response
                .pages
                .iter()
                .filter_map(|page| page.text_field())
                .map(str::to_owned)
                .collect();
            let combined = pages.join("\n\n");
            if let Some(text) = non_empty(&combined) {
                return Some(OcrText {
                    provider: "Mistral OCR",
                    text: text.to_owned(),
                    pages: Some(pages),
                });
            }
        }
        for candidate in [response.document_annotation, response.content, response.text]
        {
            if let Some(text) = candidate.as_deref().and_then(non_empty) {
                return Some(OcrText::unpaged("Mistral OCR", text.to_owned()));
            }
        }
    }

    // The typed schema found nothing. Reparse the raw value in case the
    // pages are shaped in some way the schema rejects.
    if let Some(pages) = value.get("pages").and_then(Value::as_array) {
        let texts: Vec<String> = pages
            .iter()
            .filter_map(|page| {
                ["markdown", "text", "content"]
                    .iter()
                    .find_map(|field| page.get(field).and_then(Value::as_str))
            })
            .map(str::to_owned)
            .collect();
        let combined = texts.join("\n\n");
        if let Some(text) = non_empty(&combined) {
            return Some(OcrText {
                provider: "Mistral OCR",
                text: text.to_owned(),
                pages: Some(texts),
            });
        }
    }

    // Last resort: string coercion. A bare JSON string is usable text; a
    // structured response with no text in it is not.
    debug!("unrecognized OCR response shape: {}", value);
    value
        .as_str()
        .and_then(non_empty)
        .map(|text| OcrText::unpaged("Mistral OCR", text.to_owned()))
}

/// Trimmed text, or `None` if blank.
fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}
