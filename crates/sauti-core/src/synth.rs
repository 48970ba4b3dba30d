//! Speech-synthesis collaborator.
//!
//! The engine does not control or validate synthesized audio fidelity; it
//! only needs bytes back. The provider may silently rewrite the text it
//! speaks, which is exactly why alignment is reconciled against canonical
//! text downstream instead of trusting the request.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SynthesisConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` to raw audio bytes in the provider's response format.
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        model: &str,
        instructions: Option<&str>,
    ) -> Result<Vec<u8>>;
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

/// OpenAI-compatible `/v1/audio/speech` client.
pub struct HttpSynthesizer {
    config: SynthesisConfig,
    client: reqwest::Client,
}

impl HttpSynthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("sauti/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Synthesis(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        model: &str,
        instructions: Option<&str>,
    ) -> Result<Vec<u8>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Synthesis("no API key configured".to_string()))?;

        let request = SpeechRequest {
            model,
            input: text,
            voice,
            response_format: &self.config.response_format,
            instructions,
        };

        debug!(chars = text.len(), voice, model, "requesting speech synthesis");
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(Error::Synthesis(format!(
                "provider returned {status}: {message}"
            )));
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(Error::Synthesis("provider returned empty audio".to_string()));
        }
        info!(bytes = bytes.len(), "synthesis complete");
        Ok(bytes)
    }
}
