//! Voice-agent session bootstrap
//!
//! The chat widget talks to the hosted conversational-AI agent directly; this
//! service only hands out a short-lived signed WebSocket URL so the API key
//! never leaves the server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::VoiceConfig;

/// Abstraction over the hosted voice-agent platform.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Request a signed conversation URL for the configured agent.
    async fn signed_url(&self) -> Result<String, VoiceError>;

    /// Public agent identifier used by the widget.
    fn agent_id(&self) -> &str;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to get signed URL: {status} {message}")]
    Api { status: u16, message: String },

    #[error("Missing voice configuration: {0}")]
    MissingConfig(&'static str),

    #[error("Missing signed_url in response")]
    MissingSignedUrl,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: Option<String>,
}

/// ElevenLabs Conversational AI client.
#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    agent_id: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(config: &VoiceConfig) -> Result<Self, VoiceError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(VoiceError::MissingConfig("voice.api_key"))?;
        let agent_id = config
            .agent_id
            .clone()
            .filter(|a| !a.is_empty())
            .ok_or(VoiceError::MissingConfig("voice.agent_id"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            agent_id,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VoiceProvider for ElevenLabsClient {
    async fn signed_url(&self) -> Result<String, VoiceError> {
        let url = format!(
            "{}/v1/convai/conversation/get_signed_url",
            self.base_url
        );

        let response = self
            .client
            .get(&url)
            .query(&[("agent_id", self.agent_id.as_str())])
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());
            tracing::error!(status = status.as_u16(), "ElevenLabs signed URL request failed");
            return Err(VoiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: SignedUrlResponse = response.json().await?;
        body.signed_url.ok_or(VoiceError::MissingSignedUrl)
    }

    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn name(&self) -> &str {
        "elevenlabs"
    }
}
