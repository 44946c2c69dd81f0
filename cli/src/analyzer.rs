use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

use psmf_core::analysis::{
    AnalysisError, AnalysisRequest, AnalysisResult, ChatCompletionResponse, DEFAULT_IMAGE_PROMPT,
    FoodAnalyzer, IMAGE_SYSTEM_PROMPT, TEXT_SYSTEM_PROMPT, parse_analysis_content,
};

use crate::config::AiSettings;

const APP_TITLE: &str = "PSMF Tracker";

/// Client for an OpenAI-compatible chat completions endpoint (OpenRouter by default).
pub struct OpenRouterClient {
    client: reqwest::Client,
    settings: AiSettings,
}

impl OpenRouterClient {
    pub fn new(settings: AiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "psmf-cli/{} (diet tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, settings })
    }

    async fn complete(&self, body: &Value) -> Result<String, AnalysisError> {
        let resp = self
            .client
            .post(&self.settings.url)
            .bearer_auth(&self.settings.api_key)
            .header("X-Title", APP_TITLE)
            .json(body)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;
        Ok(data.content()?.to_string())
    }
}

/// Chat request body for `request`: a plain text message, or a caption plus
/// the photo as a base64 data URL.
#[must_use]
pub fn build_chat_body(model: &str, request: &AnalysisRequest) -> Value {
    match request.image_base64.as_deref().filter(|_| request.has_image()) {
        Some(image) => json!({
            "model": model,
            "messages": [
                { "role": "system", "content": IMAGE_SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": request.caption().unwrap_or(DEFAULT_IMAGE_PROMPT) },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:{};base64,{image}", request.mime_type()) }
                        }
                    ]
                }
            ]
        }),
        None => json!({
            "model": model,
            "messages": [
                { "role": "system", "content": TEXT_SYSTEM_PROMPT },
                { "role": "user", "content": request.caption().unwrap_or_default() }
            ]
        }),
    }
}

#[async_trait]
impl FoodAnalyzer for OpenRouterClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        request.validate()?;
        let body = build_chat_body(&self.settings.model, request);
        let content = self.complete(&body).await?;
        tracing::debug!(model = %self.settings.model, "analysis response received");
        parse_analysis_content(&content, request.fallback_name())
    }
}
