// OpenAI Responses API client for maintenance recommendations
use crate::application::recommendation::{
    build_input_payload, parse_recommendation, RecommendationClient, RecommendationRequest,
    ReplyError, SYSTEM_INSTRUCTIONS,
};
use crate::domain::maintenance::AiRecommendation;
use crate::infrastructure::config::RecommendationSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("no API key configured (set recommendation.api_key or OPENAI_API_KEY)")]
    MissingApiKey,
    #[error("request to the model failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model reply has no output text")]
    EmptyOutput,
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: String,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesReply {
    fn text(&self) -> Option<String> {
        if let Some(text) = self.output_text.as_ref().filter(|t| !t.trim().is_empty()) {
            return Some(text.clone());
        }

        let parts: Vec<&str> = self
            .output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|c| c.kind == "output_text")
            .filter_map(|c| c.text.as_deref())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(""))
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(settings: &RecommendationSettings) -> Result<Self, RecommendationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty());

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    async fn request_text(&self, request: &RecommendationRequest) -> Result<String, RecommendationError> {
        let api_key = self.api_key.as_deref().ok_or(RecommendationError::MissingApiKey)?;
        let url = format!("{}/v1/responses", self.base_url);
        let body = ResponsesRequest {
            model: &self.model,
            instructions: SYSTEM_INSTRUCTIONS,
            input: build_input_payload(request).to_string(),
        };

        tracing::debug!("Requesting recommendation for {} from {}", request.machine.machine_id, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RecommendationError::Status { status, body });
        }

        let reply = response.json::<ResponsesReply>().await?;
        reply.text().ok_or(RecommendationError::EmptyOutput)
    }
}

#[async_trait]
impl RecommendationClient for OpenAiClient {
    async fn recommend(&self, request: &RecommendationRequest) -> anyhow::Result<AiRecommendation> {
        let text = self.request_text(request).await?;
        let recommendation = parse_recommendation(&text).map_err(RecommendationError::from)?;

        tracing::info!(
            "Recommendation for {}: {:?} (risk {:?})",
            request.machine.machine_id,
            recommendation.decision,
            recommendation.risk
        );
        Ok(recommendation)
    }
}
