//! `OpenAI`-style chat-completion client for vision extraction.
//!
//! One call sends the flyer image (as a base64 data URI) plus the
//! field-enumerating prompt, requests JSON-object output, and normalizes the
//! returned object into an [`ExtractionRun`]:
//!
//! - response envelope is checked (`choices[0].message.content` must exist),
//! - a possible markdown code fence around the JSON is stripped,
//! - ordinal key prefixes ("1.", "2.", …) are removed,
//! - falsy values become the no-information sentinel via
//!   [`chirashi_core::FieldValue::from_json`].
//!
//! The client is stateless across calls; token accounting is the caller's
//! concern and the reported counters are carried on the run.

use chirashi_core::{ExtractError, ExtractedRecord, FieldSchema, FieldValue, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ExtractionRun, ImagePayload, VisionModel};
use crate::prompt::build_extraction_prompt;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Chat completion request.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Content {
    Text { r#type: String, text: String },
    Image { r#type: String, image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

/// Chat completion response envelope.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// HTTP client for the extraction provider.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAIClient {
    /// Create a new client with the given API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Run one extraction call against a flyer image.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::InvalidInput`] if the schema is empty
    /// - [`ExtractError::Provider`] on transport failure or non-success status
    /// - [`ExtractError::MalformedResponse`] if the envelope lacks content
    /// - [`ExtractError::Parse`] if the content is not a JSON object
    pub async fn extract(
        &self,
        model: VisionModel,
        image: &ImagePayload,
        schema: &FieldSchema,
        request_index: usize,
    ) -> Result<ExtractionRun> {
        if schema.is_empty() {
            return Err(ExtractError::InvalidInput(
                "field schema must not be empty".to_string(),
            ));
        }

        info!(
            request_index,
            model = %model,
            image_bytes = image.size(),
            "sending extraction request"
        );

        let request = ChatRequest {
            model: model.model_id().to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    Content::Text {
                        r#type: "text".to_string(),
                        text: build_extraction_prompt(schema),
                    },
                    Content::Image {
                        r#type: "image_url".to_string(),
                        image_url: ImageUrl {
                            url: image.data_uri(),
                            detail: "high".to_string(),
                        },
                    },
                ],
            }],
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: 0.0,
            response_format: ResponseFormat {
                r#type: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractError::Provider(e.to_string()))?;

        let status = response.status();
        info!(request_index, status = %status, "provider responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Provider(format!("HTTP {status}: {body}")));
        }

        let raw_response = response
            .text()
            .await
            .map_err(|e| ExtractError::Provider(e.to_string()))?;

        let envelope: ChatResponse = serde_json::from_str(&raw_response)
            .map_err(|e| ExtractError::MalformedResponse(e.to_string()))?;

        let content = envelope
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| {
                ExtractError::MalformedResponse("response carries no message content".to_string())
            })?;

        let record = parse_record(content)?;
        info!(
            request_index,
            fields = record.len(),
            "parsed extraction payload"
        );

        let (input_tokens, output_tokens) = envelope
            .usage
            .map_or((0, 0), |u| (u.prompt_tokens, u.completion_tokens));

        Ok(ExtractionRun {
            request_index,
            record,
            raw_response,
            input_tokens,
            output_tokens,
        })
    }
}

/// Parse the message content into a normalized record.
///
/// # Errors
///
/// Returns [`ExtractError::Parse`] when the content (after fence stripping)
/// is not a JSON object.
pub fn parse_record(content: &str) -> Result<ExtractedRecord> {
    let json = extract_json(content);
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&json)?;

    let mut record = ExtractedRecord::new();
    for (key, value) in &object {
        let field = strip_ordinal_prefix(key);
        if field.is_empty() {
            debug!(key, "dropping entry with empty field name");
            continue;
        }
        record.insert(field, FieldValue::from_json(value));
    }
    Ok(record)
}

/// Extract JSON from response content, handling markdown code blocks.
fn extract_json(text: &str) -> String {
    let text = text.trim();

    // Handle ```json ... ``` wrapper
    if text.starts_with("```") {
        if let Some(start) = text.find('\n') {
            let after_first_line = &text[start + 1..];
            if let Some(end) = after_first_line.rfind("```") {
                return after_first_line[..end].trim().to_string();
            }
        }
    }

    // Fall back to the outermost object braces
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            return text[start..=end].to_string();
        }
    }

    text.to_string()
}

/// Strip a leading `<digits>.` ordinal prefix from a response key.
fn strip_ordinal_prefix(key: &str) -> &str {
    let trimmed = key.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if digits_end > 0 {
        if let Some(rest) = trimmed[digits_end..].strip_prefix('.') {
            return rest.trim_start();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirashi_core::NO_INFORMATION;

    #[test]
    fn test_strip_ordinal_prefix() {
        assert_eq!(strip_ordinal_prefix("1. 家賃"), "家賃");
        assert_eq!(strip_ordinal_prefix("12.管理費"), "管理費");
        assert_eq!(strip_ordinal_prefix(" 3. 住所 "), "住所");
        // No prefix: returned unchanged (modulo trim).
        assert_eq!(strip_ordinal_prefix("家賃"), "家賃");
        // A bare number is a field name, not a prefix.
        assert_eq!(strip_ordinal_prefix("42"), "42");
    }

    #[test]
    fn test_parse_record_strips_ordinals_and_normalizes() {
        let content = r#"{"1. 家賃": "8.5万円", "2. 管理費": null, "3. 設備（キッチン）": ["IH", "食洗機"]}"#;
        let record = parse_record(content).unwrap();

        assert_eq!(record.normalized("家賃"), "8.5万円");
        assert_eq!(record.normalized("管理費"), NO_INFORMATION);
        assert_eq!(record.normalized("設備（キッチン）"), "IH, 食洗機");
    }

    #[test]
    fn test_parse_record_handles_markdown_fence() {
        let content = "```json\n{\"1. 家賃\": \"7万円\"}\n```";
        let record = parse_record(content).unwrap();
        assert_eq!(record.normalized("家賃"), "7万円");
    }

    #[test]
    fn test_parse_record_rejects_non_object() {
        let err = parse_record("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));

        let err = parse_record("not json at all").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[test]
    fn test_extract_json_prefers_fenced_block() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\ntrailing";
        // The fence does not open the text, so brace fallback applies.
        assert_eq!(extract_json(text), "{\"a\": 1}");

        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(fenced), "{\"a\": 1}");
    }
}
