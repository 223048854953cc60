/// Best-effort prompt enhancement through a local language model.
///
/// Failure policy: on timeout, connection failure, or a malformed
/// response the original prompt is returned unchanged. Enhancement
/// may delay a generation by at most the request timeout; it can
/// never fail one.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use project::Config;

const ENHANCE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Enhancer {
    url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl Enhancer {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(ENHANCE_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// None when enhancement is switched off.
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .enhancer_enabled
            .then(|| Self::new(config.enhancer_url.clone(), config.enhancer_model.clone()))
    }

    /// Returns the improved prompt, or the original when the service
    /// is unreachable or answers nonsense.
    pub async fn enhance(&self, prompt: &str, style_hint: Option<&str>) -> String {
        match self.try_enhance(prompt, style_hint).await {
            Ok(improved) => {
                debug!(from = prompt, to = %improved, "prompt enhanced");
                improved
            }
            Err(err) => {
                warn!(error = %err, "prompt enhancement failed, using original prompt");
                prompt.to_string()
            }
        }
    }

    async fn try_enhance(
        &self,
        prompt: &str,
        style_hint: Option<&str>,
    ) -> Result<String, reqwest::Error> {
        let instruction = match style_hint {
            Some(hint) => format!(
                "Rewrite the following image-generation prompt into one vivid, \
                 specific sentence in the style of: {hint}. Reply with only the \
                 rewritten prompt.\n\n{prompt}"
            ),
            None => format!(
                "Rewrite the following image-generation prompt into one vivid, \
                 specific sentence. Reply with only the rewritten prompt.\n\n{prompt}"
            ),
        };

        let response: OllamaResponse = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&OllamaRequest {
                model: &self.model,
                prompt: instruction,
                stream: false,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let improved = response.response.trim().to_string();
        if improved.is_empty() {
            // Treated as a failure by the caller's fallback.
            Ok(prompt.to_string())
        } else {
            Ok(improved)
        }
    }
}
