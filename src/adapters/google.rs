use crate::adapters::llm::{LLMAdapter, LLMRequest, LLMResponse, ModelConfig, Usage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub struct GoogleAdapter {
    client: Client,
    config: ModelConfig,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

impl GoogleAdapter {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string());

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }
}

#[async_trait]
impl LLMAdapter for GoogleAdapter {
    /// Sampling fields of the request are left to the model defaults; only
    /// the JSON response type is forced.
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
        let google_request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(request.prompt),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.config.model_name
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&google_request)
            .send()
            .await
            .context("Failed to send request to Google Generative AI")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Google Generative AI error ({}): {}", status, body);
        }

        let google_response: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Google Generative AI response")?;

        let text: String = google_response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();
        let content = if text.trim().is_empty() {
            "{}".to_string()
        } else {
            text
        };

        debug!("Google review reply: {}", content);

        Ok(LLMResponse {
            content,
            model: google_response
                .model_version
                .unwrap_or_else(|| self.config.model_name.clone()),
            usage: google_response.usage_metadata.map(|usage| Usage {
                prompt_tokens: usage.prompt_token_count,
                completion_tokens: usage.candidates_token_count,
                total_tokens: usage.total_token_count,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
