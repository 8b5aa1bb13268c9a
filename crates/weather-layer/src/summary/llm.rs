// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Network-backed summary providers (LLM text generation).

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use super::{ProviderError, SummaryProvider};
use crate::fetch::WeatherPayload;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-4o-mini";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_TOKENS: u32 = 300;

const SYSTEM_PROMPT: &str = "You are a concise weather presenter. \
Write a friendly two to four sentence summary of the conditions described in the JSON \
the user sends. Mention temperature, how it feels, wind, and what the forecast suggests. \
Do not use markdown, lists, or emoji.";

/// Structured prompt shared by every LLM provider.
pub fn build_prompt(payload: &WeatherPayload) -> String {
    let current = &payload.current;
    let forecast: Vec<Value> = payload
        .forecast
        .iter()
        .map(|f| {
            json!({
                "time": f.observed_at.map(|t| t.to_rfc3339()),
                "temperature_c": f.temperature,
                "condition": f.condition,
            })
        })
        .collect();

    let prompt = json!({
        "location": payload.location_name(),
        "current": {
            "temperature_c": current.temperature,
            "feels_like_c": current.feels_like,
            "humidity_pct": current.humidity,
            "pressure_hpa": current.pressure,
            "wind_speed_ms": current.wind_speed,
            "wind_deg": current.wind_deg,
            "condition": current.condition,
        },
        "forecast": forecast,
        "air_quality_index": payload.air_quality.as_ref().map(|aq| aq.aqi),
    });

    prompt.to_string()
}

fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

async fn read_json(response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

fn non_empty(text: &str) -> Result<String, ProviderError> {
    let text = text.trim();
    if text.is_empty() {
        Err(ProviderError::Empty)
    } else {
        Ok(text.to_string())
    }
}

/// Text of the first `text` block of a Messages API response.
fn anthropic_text(body: &Value) -> Result<String, ProviderError> {
    let content = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::Malformed("missing 'content' array".into()))?;

    let text = content
        .iter()
        .find(|item| item["type"] == "text")
        .and_then(|item| item["text"].as_str())
        .ok_or_else(|| ProviderError::Malformed("missing text content".into()))?;

    non_empty(text)
}

/// Text of the first choice of a Chat Completions response.
fn openai_text(body: &Value) -> Result<String, ProviderError> {
    let text = body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Malformed("missing choices[0].message.content".into()))?;

    non_empty(text)
}

/// Summary provider A: Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client()?,
            api_key,
            model: ANTHROPIC_MODEL.to_string(),
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl SummaryProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(&self, payload: &WeatherPayload) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredentials("anthropic"));
        }

        let request = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": build_prompt(payload) }],
        });

        debug!("Requesting summary from Anthropic ({})", self.model);

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        anthropic_text(&read_json(response).await?)
    }
}

/// Summary provider B: OpenAI Chat Completions API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client()?,
            api_key,
            model: OPENAI_MODEL.to_string(),
        })
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl SummaryProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, payload: &WeatherPayload) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingCredentials("openai"));
        }

        let request = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(payload) },
            ],
        });

        debug!("Requesting summary from OpenAI ({})", self.model);

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        openai_text(&read_json(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::payload;

    #[test]
    fn test_prompt_carries_current_conditions() {
        let prompt: Value = serde_json::from_str(&build_prompt(&payload("London", 18.0, "clear"))).unwrap();
        assert_eq!(prompt["location"], "London");
        assert_eq!(prompt["current"]["temperature_c"], 18.0);
        assert_eq!(prompt["current"]["condition"], "clear");
        assert_eq!(prompt["forecast"].as_array().unwrap().len(), 2);
        assert_eq!(prompt["air_quality_index"], 2);
    }

    #[test]
    fn test_anthropic_text_extraction() {
        let body = json!({
            "content": [
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": " Mild and clear in London. " }
            ]
        });
        assert_eq!(anthropic_text(&body).unwrap(), "Mild and clear in London.");

        let empty = json!({ "content": [{ "type": "text", "text": "" }] });
        assert_eq!(anthropic_text(&empty), Err(ProviderError::Empty));

        assert!(matches!(anthropic_text(&json!({})), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_openai_text_extraction() {
        let body = json!({ "choices": [{ "message": { "role": "assistant", "content": "Clear skies." } }] });
        assert_eq!(openai_text(&body).unwrap(), "Clear skies.");

        assert!(matches!(openai_text(&json!({ "choices": [] })), Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_empty_key_is_missing_credentials() {
        let provider = AnthropicProvider::new(String::new()).unwrap();
        let err = provider.generate(&payload("London", 18.0, "clear")).await.unwrap_err();
        assert_eq!(err, ProviderError::MissingCredentials("anthropic"));

        let provider = OpenAiProvider::new(String::new()).unwrap();
        let err = provider.generate(&payload("London", 18.0, "clear")).await.unwrap_err();
        assert_eq!(err, ProviderError::MissingCredentials("openai"));
    }
}
