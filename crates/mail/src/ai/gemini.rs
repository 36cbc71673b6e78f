//! Gemini API client

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use super::TextGenerator;
use crate::config::DEFAULT_GEMINI_MODEL;

/// Blocking client for `models/{model}:generateContent`
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub const BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: Self::BASE_URL.to_string(),
        }
    }

    /// Client using `GEMINI_API_KEY` and the default model
    pub fn from_env() -> Self {
        Self::new(crate::config::gemini_api_key(), DEFAULT_GEMINI_MODEL)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("GEMINI_API_KEY is not set")?;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!("Calling Gemini model {}", self.model);
        let mut response = ureq::post(&self.endpoint())
            .header("x-goog-api-key", api_key)
            .send_json(&request)
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => {
                    anyhow::anyhow!("Gemini request failed with HTTP {}", code)
                }
                other => anyhow::Error::new(other).context("Failed to send Gemini request"),
            })?;

        let body: GenerateResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse Gemini response")?;

        body.text().context("Gemini returned no text")
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(Some("k".to_string()), "gemini-1.5-flash");
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_blank_key_is_not_configured() {
        assert!(!GeminiClient::new(Some("  ".to_string()), "m").is_configured());
        assert!(!GeminiClient::new(None, "m").is_configured());
        assert!(GeminiClient::new(Some("k".to_string()), "m").is_configured());
    }

    #[test]
    fn test_generate_without_key_fails_locally() {
        let err = GeminiClient::new(None, "m").generate("hi").unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: "hello" }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"contents": [{"parts": [{"text": "hello"}]}]})
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "Hello "}, {"text": "there"}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello there"));

        let empty: GenerateResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(empty.text(), None);
    }
}
