//! Data models for ensemble extraction.
//!
//! This module defines the types that flow between the provider client, the
//! batch scheduler, and the reconciliation engine:
//!
//! - [`ImagePayload`] - an encoded flyer photo ready for data-URI embedding
//! - [`VisionModel`] - provider model catalog with per-token pricing
//! - [`ExtractionRun`] - one successful call's normalized output plus audit data
//!
//! ## LLM Client Submodules
//!
//! - [`openai`] - `OpenAI`-style chat-completion client for vision models

pub mod openai;

use chirashi_core::{ExtractError, ExtractedRecord, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported image encodings for the flyer photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// PNG encoded image
    Png,
    /// JPEG encoded image
    Jpeg,
}

impl ImageFormat {
    /// MIME type string used in the data URI.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Detect the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidInput`] for unsupported extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(ExtractError::InvalidInput(format!(
                "unsupported image extension '{other}' (expected png, jpg, jpeg)"
            ))),
        }
    }
}

/// An encoded flyer photo.
///
/// The payload must be non-empty; the provider client embeds it as a base64
/// data URI in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    data: Vec<u8>,
    format: ImageFormat,
}

impl ImagePayload {
    /// Wrap encoded image bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidInput`] if `data` is empty.
    pub fn from_bytes(data: Vec<u8>, format: ImageFormat) -> Result<Self> {
        if data.is_empty() {
            return Err(ExtractError::InvalidInput(
                "image payload must not be empty".to_string(),
            ));
        }
        Ok(Self { data, format })
    }

    /// Read an image file, detecting the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Io`] if reading fails and
    /// [`ExtractError::InvalidInput`] for unsupported or empty files.
    pub fn from_path(path: &Path) -> Result<Self> {
        let format = ImageFormat::from_path(path)?;
        let data = std::fs::read(path)?;
        Self::from_bytes(data, format)
    }

    /// Raw encoded bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Render the payload as a `data:` URI for the provider request.
    #[must_use]
    pub fn data_uri(&self) -> String {
        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{};base64,{b64}", self.format.mime_type())
    }
}

/// Provider model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisionModel {
    /// GPT-4o - strongest vision extraction
    Gpt4o,
    /// GPT-4o mini - cheap default for flyer extraction
    #[default]
    Gpt4oMini,
}

impl VisionModel {
    /// The provider API model identifier string.
    #[must_use]
    pub const fn model_id(&self) -> &str {
        match self {
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
        }
    }

    /// Cost per 1M tokens (input, output), in USD.
    #[must_use]
    pub const fn cost_per_million(&self) -> (f64, f64) {
        match self {
            Self::Gpt4o => (2.50, 10.00),
            Self::Gpt4oMini => (0.15, 0.60),
        }
    }

    /// Total API cost for a given number of tokens.
    #[must_use]
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let (input_rate, output_rate) = self.cost_per_million();
        (input_tokens as f64 * input_rate / 1_000_000.0)
            + (output_tokens as f64 * output_rate / 1_000_000.0)
    }
}

impl std::fmt::Display for VisionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.model_id())
    }
}

impl std::str::FromStr for VisionModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gpt-4o" | "gpt4o" | "4o" => Ok(Self::Gpt4o),
            "gpt-4o-mini" | "gpt4o-mini" | "4o-mini" | "mini" => Ok(Self::Gpt4oMini),
            _ => Err(format!(
                "unknown vision model '{s}'. Valid options: gpt-4o, gpt-4o-mini"
            )),
        }
    }
}

/// One successful extraction call's outcome.
///
/// Holds the normalized record, the raw provider response body preserved
/// verbatim for audit, and the provider-reported token counters. Failed
/// calls produce no run; they are logged and dropped at the batch boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRun {
    /// Index of the originating request within the batch (0-based).
    pub request_index: usize,
    /// Normalized field→value record.
    pub record: ExtractedRecord,
    /// Verbatim provider response body, kept for audit and debugging.
    pub raw_response: String,
    /// Provider-reported input token count (0 when not reported).
    pub input_tokens: u64,
    /// Provider-reported output token count (0 when not reported).
    pub output_tokens: u64,
}
