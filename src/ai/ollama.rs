use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::InferenceConfig;
use crate::error::{AppError, Result};

use super::backfill::Scorer;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Thin client for a local Ollama server.
pub struct OllamaClient {
    client: Client,
    base_url: Url,
    model: String,
    probe_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: Url::parse(&config.url)?,
            model: config.model.clone(),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// True if anything answers HTTP on the base URL within the probe timeout.
    pub async fn probe(&self) -> bool {
        self.client
            .get(self.base_url.clone())
            .timeout(self.probe_timeout)
            .send()
            .await
            .is_ok()
    }

    /// Single non-streaming generation at temperature 0.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = self.base_url.join("api/generate")?;
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };

        let response = match self.client.post(url).json(&request).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return Err(AppError::InferenceUnreachable(self.base_url.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::InferenceApi(format!("{}: {}", status, error_text)));
        }

        let generated: GenerateResponse = response.json().await?;
        Ok(generated.response)
    }
}

impl Scorer for OllamaClient {
    async fn score(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}
