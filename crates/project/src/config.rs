/// Environment-driven application configuration.
///
/// Loaded once at startup into an immutable struct that is passed
/// explicitly to components; nothing below this layer reads the
/// environment on its own.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown project: {0}")]
    UnknownProject(String),
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("{backend} backend requires {var} to be set")]
    MissingCredential {
        backend: &'static str,
        var: &'static str,
    },
}

/// Which generation strategy turns a prompt into an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Replicate HTTP API: submit, poll, download.
    Remote,
    /// In-process CPU sampler.
    Local,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Selected generation backend.
    pub backend: BackendKind,

    /// Replicate API token; only required when `backend` is remote.
    pub replicate_token: Option<String>,

    /// Root directory holding one subdirectory per project.
    pub data_dir: PathBuf,

    /// Denoising steps for the local backend.
    pub local_steps: u32,

    /// Prompt adherence for the local backend.
    pub guidance_scale: f32,

    /// Whether prompts are rewritten by the local language model first.
    pub enhancer_enabled: bool,

    /// Ollama-compatible endpoint for prompt enhancement.
    pub enhancer_url: String,

    /// Model name passed to the enhancer endpoint.
    pub enhancer_model: String,

    /// Debug-level logging.
    pub verbose: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable source. `from_env` is
    /// the thin production wrapper; tests supply a map.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match lookup("REELSMITH_BACKEND").as_deref() {
            None | Some("remote") => BackendKind::Remote,
            Some("local") => BackendKind::Local,
            Some(other) => {
                return Err(ConfigError::InvalidEnv {
                    var: "REELSMITH_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let data_dir = lookup("REELSMITH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(crate::app_data_dir);

        let local_steps = parse_or("REELSMITH_LOCAL_STEPS", &lookup, 20u32)?;
        let guidance_scale = parse_or("REELSMITH_GUIDANCE", &lookup, 7.5f32)?;

        Ok(Self {
            backend,
            replicate_token: lookup("REPLICATE_API_TOKEN").filter(|t| !t.is_empty()),
            data_dir,
            local_steps,
            guidance_scale,
            enhancer_enabled: parse_bool(lookup("REELSMITH_ENHANCER")),
            enhancer_url: lookup("REELSMITH_ENHANCER_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            enhancer_model: lookup("REELSMITH_ENHANCER_MODEL")
                .unwrap_or_else(|| "llama3.2".to_string()),
            verbose: parse_bool(lookup("REELSMITH_VERBOSE")),
        })
    }
}

fn parse_bool(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var,
            value: raw.clone(),
        }),
    }
}
