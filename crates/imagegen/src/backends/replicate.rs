/// Replicate API backend.
///
/// Submits the prompt against the project's model, polls the
/// prediction at a fixed interval until the service settles, then
/// downloads the first output into the project's image directory.
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ImageBackend;
use crate::progress::ProgressSink;
use crate::prompt::effective_prompt;
use crate::GenerateError;
use project::{store, AssetStore, BackendKind, Project};

const DEFAULT_BASE_URL: &str = "https://api.replicate.com";
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Poll budget; at the fixed interval this bounds a prediction to
/// five minutes before `TimedOut`.
const MAX_POLLS: u32 = 300;

pub struct ReplicateBackend {
    api_key: String,
    base_url: String,
    store: AssetStore,
    client: reqwest::Client,
}

impl ReplicateBackend {
    pub fn new(api_key: String, store: AssetStore) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            store,
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different service root (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn create_prediction(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<Prediction, GenerateError> {
        let response = self
            .client
            .post(format!("{}/v1/models/{}/predictions", self.base_url, model))
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&PredictionRequest {
                input: PredictionInput {
                    prompt: prompt.to_string(),
                    aspect_ratio: "9:16",
                    num_outputs: 1,
                },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(service_error(status, detail));
        }
        Ok(response.json().await?)
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction, GenerateError> {
        let response = self
            .client
            .get(format!("{}/v1/predictions/{}", self.base_url, id))
            .header("Authorization", format!("Token {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(service_error(status, detail));
        }
        Ok(response.json().await?)
    }

    async fn download(&self, url: &str, dest: &PathBuf) -> Result<(), GenerateError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(service_error(status, format!("download failed: {url}")));
        }
        let bytes = response.bytes().await?;
        let tmp = dest.with_extension("png.tmp");
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, dest)?;
        Ok(())
    }
}

#[async_trait]
impl ImageBackend for ReplicateBackend {
    fn name(&self) -> &str {
        "Replicate"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn generate(
        &self,
        project: &Project,
        prompt: &str,
        progress: &ProgressSink,
    ) -> Result<PathBuf, GenerateError> {
        self.store.ensure_dirs(project).map_err(io_from_store)?;
        let submitted = effective_prompt(project.trigger.as_deref(), prompt);

        let prediction = self.create_prediction(&project.model, &submitted).await?;
        info!(id = %prediction.id, model = %project.model, "prediction submitted");
        progress.stage("submitted");

        let mut current = prediction;
        let mut polls = 0u32;
        while !current.is_settled() {
            if polls >= MAX_POLLS {
                return Err(GenerateError::TimedOut);
            }
            polls += 1;
            tokio::time::sleep(POLL_INTERVAL).await;
            current = self.get_prediction(&current.id).await?;
            progress.stage(format!("polling ({})", current.status));
            debug!(id = %current.id, status = %current.status, "poll");
        }

        if current.status != "succeeded" {
            let detail = current
                .error
                .unwrap_or_else(|| format!("prediction {}", current.status));
            return Err(GenerateError::Failed(detail));
        }

        let url = current
            .output
            .as_ref()
            .and_then(first_output_url)
            .ok_or_else(|| GenerateError::Failed("prediction returned no output".to_string()))?
            .to_string();

        progress.stage("downloading");
        let dest = self
            .store
            .images_dir(project)
            .join(store::image_filename(prompt));
        self.download(&url, &dest).await?;

        progress.stage("done");
        info!(path = %dest.display(), "image downloaded");
        Ok(dest)
    }
}

fn service_error(status: StatusCode, detail: String) -> GenerateError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerateError::Auth,
        StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => GenerateError::RateLimited,
        _ => GenerateError::Service {
            status: status.as_u16(),
            detail,
        },
    }
}

fn io_from_store(err: project::StoreError) -> GenerateError {
    match err {
        project::StoreError::Io(io) => GenerateError::Io(io),
        other => GenerateError::Backend(other.to_string()),
    }
}

/// Replicate returns either a list of URLs or a single URL string.
fn first_output_url(output: &serde_json::Value) -> Option<&str> {
    match output {
        serde_json::Value::String(url) => Some(url),
        serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct PredictionRequest {
    input: PredictionInput,
}

#[derive(Debug, Serialize)]
struct PredictionInput {
    prompt: String,
    aspect_ratio: &'static str,
    num_outputs: u32,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    output: Option<serde_json::Value>,
    error: Option<String>,
}

impl Prediction {
    fn is_settled(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_serialization() {
        let input = PredictionInput {
            prompt: "WDVSN style, a lakeside ceremony".to_string(),
            aspect_ratio: "9:16",
            num_outputs: 1,
        };
        let json = serde_json::to_string(&input).unwrap();
        assert!(json.contains("\"aspect_ratio\":\"9:16\""));
        assert!(json.contains("WDVSN"));
    }

    #[test]
    fn test_first_output_url_shapes() {
        let array = serde_json::json!(["https://a/img.png", "https://b/img.png"]);
        assert_eq!(first_output_url(&array), Some("https://a/img.png"));

        let single = serde_json::json!("https://a/img.png");
        assert_eq!(first_output_url(&single), Some("https://a/img.png"));

        assert_eq!(first_output_url(&serde_json::json!({})), None);
        assert_eq!(first_output_url(&serde_json::json!([])), None);
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            service_error(StatusCode::UNAUTHORIZED, String::new()),
            GenerateError::Auth
        ));
        assert!(matches!(
            service_error(StatusCode::TOO_MANY_REQUESTS, String::new()),
            GenerateError::RateLimited
        ));
        assert!(matches!(
            service_error(StatusCode::PAYMENT_REQUIRED, String::new()),
            GenerateError::RateLimited
        ));
        assert!(matches!(
            service_error(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()),
            GenerateError::Service { status: 500, .. }
        ));
    }

    #[test]
    fn test_prediction_settled_states() {
        for (status, settled) in [
            ("starting", false),
            ("processing", false),
            ("succeeded", true),
            ("failed", true),
            ("canceled", true),
        ] {
            let prediction = Prediction {
                id: "p1".to_string(),
                status: status.to_string(),
                output: None,
                error: None,
            };
            assert_eq!(prediction.is_settled(), settled, "status {status}");
        }
    }
}
