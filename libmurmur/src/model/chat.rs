//! OpenAI-compatible `/chat/completions` backend
//!
//! Works against hosted APIs and local servers (llama.cpp, vLLM, Ollama)
//! alike; only the base URL and model name differ.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::config::{secret_from_env, ModelConfig};
use crate::error::{ModelError, Result};
use crate::model::LanguageModel;

pub struct ChatCompletionModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    temperature: f32,
    top_p: f32,
}

impl ChatCompletionModel {
    pub fn new(config: &ModelConfig, timeout: Duration) -> Result<Self> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(secret_from_env(var)?),
            None => None,
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
            "temperature": self.temperature,
            "top_p": self.top_p,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ModelError::Request(format!("HTTP {}: {}", status.as_u16(), body_text)).into());
        }

        let resp = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;
        let text = resp["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse.into());
        }

        tracing::debug!(
            model = %self.model,
            prompt_tokens = resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            completion_tokens = resp["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            "Model completion"
        );
        Ok(text.to_string())
    }
}
