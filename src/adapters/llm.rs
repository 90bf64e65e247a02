use crate::config::{AiVendor, Config};
use crate::core::comment::{parse_review_response, ReviewFinding};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

/// Sampling settings sent with every review request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
}

impl LLMRequest {
    pub fn review(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.2,
            top_p: 1.0,
            max_tokens: 700,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse>;
    fn model_name(&self) -> &str;
}

pub fn create_adapter(vendor: AiVendor, config: &Config) -> Result<Box<dyn LLMAdapter>> {
    match vendor {
        AiVendor::OpenAi => {
            let model_config = ModelConfig {
                model_name: config.openai_api_model.clone(),
                api_key: config
                    .openai_api_key
                    .clone()
                    .context("OpenAI API key not found. Set OPENAI_API_KEY")?,
                base_url: config.openai_base_url.clone(),
            };
            Ok(Box::new(crate::adapters::OpenAIAdapter::new(model_config)?))
        }
        AiVendor::Google => {
            let model_config = ModelConfig {
                model_name: config.google_model.clone(),
                api_key: config
                    .google_api_key
                    .clone()
                    .context("Google API key not found. Set GOOGLE_GENERATIVE_AI_API_KEY")?,
                base_url: config.google_base_url.clone(),
            };
            Ok(Box::new(crate::adapters::GoogleAdapter::new(model_config)?))
        }
    }
}

/// Turns prompts into review findings through the configured vendor.
///
/// Every failure is reported as "no findings" so one bad hunk never ends a run.
pub struct ReviewModelClient {
    adapter: Option<Box<dyn LLMAdapter>>,
}

impl ReviewModelClient {
    pub fn new(adapter: Box<dyn LLMAdapter>) -> Self {
        Self {
            adapter: Some(adapter),
        }
    }

    /// A client with no backend; every hunk yields no findings.
    pub fn unconfigured() -> Self {
        Self { adapter: None }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        match config.ai_vendor.as_deref() {
            Some(raw) => match AiVendor::parse(raw) {
                Some(vendor) => Ok(Self::new(create_adapter(vendor, config)?)),
                None => {
                    warn!("Unsupported AI_VENDOR {:?}; no hunk will receive findings", raw);
                    Ok(Self::unconfigured())
                }
            },
            None => {
                warn!("AI_VENDOR is not set; no hunk will receive findings");
                Ok(Self::unconfigured())
            }
        }
    }

    pub fn model_name(&self) -> Option<&str> {
        self.adapter.as_deref().map(|adapter| adapter.model_name())
    }

    pub async fn generate_findings(&self, prompt: &str) -> Option<Vec<ReviewFinding>> {
        let adapter = self.adapter.as_deref()?;

        let response = match adapter.complete(LLMRequest::review(prompt)).await {
            Ok(response) => response,
            Err(err) => {
                error!("Model request to {} failed: {:#}", adapter.model_name(), err);
                return None;
            }
        };

        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "model usage"
            );
        }

        parse_review_response(&response.content)
    }
}
