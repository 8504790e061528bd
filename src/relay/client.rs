//! HTTP client for the upstream API.

use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::error_handling::{categorize_reqwest_error, categorize_status, UpstreamError};

/// Sends JSON bodies to one upstream endpoint, authenticating with a
/// credential passed in a header.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    endpoint: Url,
    key_header: String,
}

impl UpstreamClient {
    pub fn new(client: Client, endpoint: Url, key_header: impl Into<String>) -> Self {
        UpstreamClient {
            client,
            endpoint,
            key_header: key_header.into(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POSTs `body` with `secret` in the key header.
    ///
    /// A 2xx response is parsed as JSON (non-JSON bodies come back as a JSON
    /// string). Anything else is categorized into an [`UpstreamError`].
    pub async fn send(&self, secret: &str, body: &Value) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(self.key_header.as_str(), secret)
            .json(body)
            .send()
            .await
            .map_err(|e| categorize_reqwest_error(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| categorize_reqwest_error(&e))?;

        if !status.is_success() {
            return Err(categorize_status(status.as_u16(), &text));
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

/// Turns one input line into a request body.
///
/// A line holding a JSON object is forwarded as is; anything else is treated as
/// a plain prompt and wrapped in a `generateContent` body.
pub fn build_request_body(line: &str) -> Value {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
    }
    prompt_body(trimmed)
}

/// `generateContent` body for a single text prompt.
pub fn prompt_body(prompt: &str) -> Value {
    json!({
        "contents": [
            { "parts": [ { "text": prompt } ] }
        ]
    })
}

/// Pulls the generated text out of a `generateContent` response, joining all
/// text parts of the first candidate.
pub fn extract_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}
