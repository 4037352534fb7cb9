use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde_json::{Value, json};

use super::models::GeminiResponse;
use crate::types::{GenerationConfig, ImagePart};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the `{model}:generateContent` endpoint family.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    endpoint: String,
    model: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_timeout(api_key, endpoint, model, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            http,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            model: model.into(),
            generation: GenerationConfig::default(),
        }
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one generation request bundling the query text and the inline
    /// images. The raw body is kept in the error when anything goes wrong so
    /// failures stay diagnosable.
    pub async fn generate(&self, query: &str, images: &[ImagePart]) -> Result<GeminiResponse> {
        let query = query.trim();
        if query.is_empty() && images.is_empty() {
            return Err(anyhow!("A query or at least one image is required"));
        }

        let url = format!(
            "{}/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );
        let body = build_generation_body(query, images, &self.generation);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("HTTP request to Gemini failed")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Reading Gemini response body failed")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Gemini generateContent failed: status {} body {}",
                status,
                response_text
            ));
        }

        serde_json::from_str(&response_text).with_context(|| {
            format!(
                "Failed to decode Gemini response JSON. Raw response: {}",
                response_text
            )
        })
    }
}

/// The `contents` array: a single user turn with the text part first and one
/// inline part per image. An empty query contributes no text part.
pub fn build_contents(query: &str, images: &[ImagePart]) -> Vec<Value> {
    let mut parts: Vec<Value> = Vec::with_capacity(images.len() + 1);
    if !query.is_empty() {
        parts.push(json!({ "text": query }));
    }
    for image in images {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.data_b64,
            }
        }));
    }
    vec![json!({ "role": "user", "parts": parts })]
}

pub fn build_generation_body(
    query: &str,
    images: &[ImagePart],
    generation: &GenerationConfig,
) -> Value {
    json!({
        "contents": build_contents(query, images),
        "generationConfig": generation,
    })
}

/// Concatenated text parts of the first candidate. Blocked prompts and
/// truncated candidates surface as errors naming the provider's reason.
pub fn response_text(response: &GeminiResponse) -> Result<String> {
    let Some(candidate) = response.candidates.first() else {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Err(anyhow!("Request was blocked by the provider: {}", reason));
        }
        return Err(anyhow!("No candidates in Gemini response"));
    };

    let mut full_text = String::new();
    if let Some(content) = &candidate.content {
        for part in &content.parts {
            if let Some(text) = &part.text {
                full_text.push_str(text);
            }
        }
    }

    if full_text.is_empty() {
        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason != "STOP" {
                return Err(anyhow!(
                    "Gemini returned no text (finish reason: {})",
                    reason
                ));
            }
        }
    }

    Ok(full_text)
}
