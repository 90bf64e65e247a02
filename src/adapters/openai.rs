use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use crate::adapters::llm::{LLMAdapter, LLMRequest, LLMResponse, ModelConfig, Usage};

pub struct OpenAIAdapter {
    client: Client,
    config: ModelConfig,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    top_p: f32,
    max_tokens: usize,
    frequency_penalty: f32,
    presence_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    usage: Option<OpenAIUsage>,
    model: String,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

impl OpenAIAdapter {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let base_url = config.base_url.clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

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

/// Models that accept `response_format: json_object`.
pub fn supports_json_mode(model: &str) -> bool {
    matches!(
        model,
        "gpt-4-1106-preview" | "gpt-4-0125-preview" | "gpt-3.5-turbo-1106" | "gpt-3.5-turbo-0125"
    ) || model.starts_with("gpt-4-turbo")
        || model.starts_with("gpt-4o")
        || model.starts_with("gpt-4.1")
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse> {
        let model = self.config.model_name.clone();
        let response_format = supports_json_mode(&model).then_some(ResponseFormat {
            format_type: "json_object",
        });

        let openai_request = OpenAIRequest {
            model,
            messages: vec![Message {
                role: "system".to_string(),
                content: Some(request.prompt),
            }],
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            response_format,
        };

        let response = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&openai_request)
            .send()
            .await
            .context("Failed to send request to OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let openai_response: OpenAIResponse = response.json().await
            .context("Failed to parse OpenAI response")?;

        let content = openai_response.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| "{}".to_string());

        Ok(LLMResponse {
            content,
            model: openai_response.model,
            usage: openai_response.usage.map(|usage| Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
