#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::{GenerationConfig, OllamaConfig};
use crate::generation::{Generator, SamplingParams};

/// Generator backed by Ollama's `/api/generate` endpoint.
///
/// Each call is a single non-streaming request; failures are not retried.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    base_url: Url,
    model: String,
    max_new_tokens: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize, PartialEq)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(ollama: &OllamaConfig, generation: &GenerationConfig) -> Result<Self> {
        let base_url = ollama
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(generation.timeout_seconds)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: generation.model.clone(),
            max_new_tokens: generation.max_new_tokens,
            agent,
        })
    }

    fn options(&self, sampling: &SamplingParams) -> GenerateOptions {
        if sampling.do_sample {
            GenerateOptions {
                num_predict: self.max_new_tokens,
                temperature: sampling.temperature.unwrap_or(1.0),
                top_p: sampling.top_p,
            }
        } else {
            // Zero temperature makes Ollama decode greedily
            GenerateOptions {
                num_predict: self.max_new_tokens,
                temperature: 0.0,
                top_p: None,
            }
        }
    }
}

impl Generator for OllamaGenerator {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn generate(&self, prompt: &str, sampling: &SamplingParams) -> Result<String> {
        let url = self
            .base_url
            .join("/api/generate")
            .context("Failed to build generate URL")?;

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.options(sampling),
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize generate request")?;

        debug!(
            "Generating with {} (prompt length: {}, do_sample: {})",
            self.model,
            prompt.len(),
            sampling.do_sample
        );

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| {
                warn!("Generation request to {} failed: {}", url, e);
                anyhow::anyhow!("Generation request failed: {}", e)
            })?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .context("Failed to parse generate response")?;

        debug!("Generated {} characters", response.response.len());
        Ok(response.response)
    }
}
