//! OCR providers.
//!
//! A provider is anything that can turn a file into text: the Mistral OCR
//! API, or the local Tesseract/lopdf fallback. Both return the shared
//! [`OcrText`] type, so the pipeline never branches on provider-specific
//! response shapes.

use async_trait::async_trait;

use crate::prelude::*;

pub mod mistral;
pub mod tesseract;

/// Text extracted from one file by one provider.
#[derive(Clone, Debug)]
pub struct OcrText {
    /// Human-readable name of the provider that produced this text. Recorded
    /// in the output front matter.
    pub provider: &'static str,

    /// The extracted text, with pages joined by blank lines.
    pub text: String,

    /// Per-page texts, when the provider preserves page structure.
    pub pages: Option<Vec<String>>,
}

impl OcrText {
    /// Build a single-block result with no page structure.
    pub fn unpaged(provider: &'static str, text: String) -> OcrText {
        OcrText {
            provider,
            text,
            pages: None,
        }
    }
}

/// An OCR backend exposing a uniform "extract text from file" capability.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Human-readable provider name, for logs and output metadata.
    fn name(&self) -> &'static str;

    /// Extract text from `path`. Returns `Ok(None)` when the provider ran
    /// but produced no usable text; errors are reserved for unexpected
    /// failures the caller may want to log with context.
    async fn extract(&self, path: &Path) -> Result<Option<OcrText>>;

    /// Is this provider usable right now? Probed once before a run starts.
    async fn check_available(&self) -> bool;
}
