use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info, warn};

use juso_core::{OcrOutput, OcrProvider};

use crate::mime_detect::detect_mime_type;

pub const DEFAULT_ENDPOINT: &str = "https://api.upstage.ai/v1/document-digitization";

/// Upstage document OCR over HTTP multipart.
pub struct UpstageOcr {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl UpstageOcr {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: "ocr".to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Upstage HTTP client")?;
        Ok(self)
    }

    async fn send(&self, image: &[u8], file_name: &str) -> Result<Value> {
        let part = Part::bytes(image.to_vec())
            .file_name(file_name.to_string())
            .mime_str(detect_mime_type(std::path::Path::new(file_name)))
            .context("Invalid image MIME type")?;
        let form = Form::new()
            .part("document", part)
            .text("model", self.model.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("Upstage OCR request failed")?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Upstage OCR returned {}: {}", status, error_body);
        }

        response
            .json()
            .await
            .context("Invalid OCR response format")
    }
}

#[async_trait]
impl OcrProvider for UpstageOcr {
    fn name(&self) -> &str {
        "upstage"
    }

    async fn extract_text(&self, image: &[u8], file_name: &str) -> Result<OcrOutput> {
        info!(file = file_name, bytes = image.len(), endpoint = %self.endpoint, "Starting OCR");
        let raw = self.send(image, file_name).await?;
        let output = ocr_output_from_value(raw);
        info!(
            chars = output.text.chars().count(),
            total_words = output.total_words,
            avg_confidence = output.average_word_confidence,
            "OCR completed"
        );
        Ok(output)
    }
}

/// Build the text and quality signals from an Upstage response body.
pub fn ocr_output_from_value(raw: Value) -> OcrOutput {
    let text = extract_text(&raw);
    let (total_words, average_word_confidence) = word_confidence(&raw);
    OcrOutput {
        text,
        total_words,
        average_word_confidence,
        raw,
    }
}

/// Top-level `text`, else page texts, else page words.
pub fn extract_text(raw: &Value) -> String {
    if let Some(text) = raw.get("text").and_then(Value::as_str).filter(|t| !t.is_empty()) {
        return text.trim().to_string();
    }

    let Some(pages) = raw.get("pages").and_then(Value::as_array) else {
        let keys: Vec<&String> = raw.as_object().map(|o| o.keys().collect()).unwrap_or_default();
        warn!(?keys, "Unknown OCR result structure");
        return String::new();
    };

    let page_texts: Vec<&str> = pages
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .collect();
    if !page_texts.is_empty() {
        return page_texts.join(" ").trim().to_string();
    }

    debug!("Rebuilding OCR text from words");
    pages
        .iter()
        .map(|page| {
            page.get("words")
                .and_then(Value::as_array)
                .map(|words| {
                    words
                        .iter()
                        .filter_map(|w| w.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default()
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Word count and mean confidence over all words; missing confidences count as zero.
fn word_confidence(raw: &Value) -> (usize, f64) {
    let words: Vec<&Value> = raw
        .get("pages")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|p| p.get("words").and_then(Value::as_array))
        .flatten()
        .collect();
    if words.is_empty() {
        return (0, 0.0);
    }
    let sum: f64 = words
        .iter()
        .filter_map(|w| w.get("confidence").and_then(Value::as_f64))
        .sum();
    (words.len(), sum / words.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefers_top_level_text() {
        let raw = json!({"text": "  홍길동 010-1234-5678\n", "pages": [{"text": "ignored"}]});
        assert_eq!(extract_text(&raw), "홍길동 010-1234-5678");
    }

    #[test]
    fn falls_back_to_page_texts() {
        let raw = json!({"text": "", "pages": [{"text": "서울 강남구"}, {"text": ""}, {"text": "자곡로 100"}]});
        assert_eq!(extract_text(&raw), "서울 강남구 자곡로 100");
    }

    #[test]
    fn rebuilds_from_words() {
        let raw = json!({"pages": [
            {"words": [{"text": "부산"}, {"text": "해운대구"}]},
            {"words": [{"text": "우동"}]}
        ]});
        assert_eq!(extract_text(&raw), "부산 해운대구 우동");
    }

    #[test]
    fn unknown_structure_is_empty() {
        assert_eq!(extract_text(&json!({"status": "ok"})), "");
    }

    #[test]
    fn averages_over_all_words() {
        let raw = json!({"pages": [{"words": [
            {"text": "a", "confidence": 0.9},
            {"text": "b", "confidence": 0.7},
            {"text": "c"},
            {"text": "d", "confidence": 0.8}
        ]}]});
        let output = ocr_output_from_value(raw);
        assert_eq!(output.total_words, 4);
        assert!((output.average_word_confidence - 0.6).abs() < 1e-9);
        assert_eq!(output.text, "a b c d");
    }

    #[test]
    fn no_words_means_zero_confidence() {
        let output = ocr_output_from_value(json!({"text": "x"}));
        assert_eq!(output.total_words, 0);
        assert_eq!(output.average_word_confidence, 0.0);
    }
}
