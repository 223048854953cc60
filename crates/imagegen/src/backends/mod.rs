/// Generation backends.
///
/// One capability trait over a closed set of variants, dispatched by
/// configuration at startup:
/// - Replicate API (submit, poll, download)
/// - Local in-process sampler

pub mod local;
pub mod replicate;

use std::path::PathBuf;

use async_trait::async_trait;

pub use local::LocalBackend;
pub use replicate::ReplicateBackend;

use crate::progress::ProgressSink;
use crate::GenerateError;
use project::{AssetStore, BackendKind, Config, ConfigError, Project};

/// A strategy that turns a prompt into one image file inside the
/// project's image directory, streaming progress while it works.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Backend name for status lines.
    fn name(&self) -> &str;

    fn kind(&self) -> BackendKind;

    async fn generate(
        &self,
        project: &Project,
        prompt: &str,
        progress: &ProgressSink,
    ) -> Result<PathBuf, GenerateError>;
}

pub struct BackendFactory;

impl BackendFactory {
    /// Build the configured backend. A missing credential for the
    /// selected backend is the only fatal configuration error here.
    pub fn create(
        config: &Config,
        store: &AssetStore,
    ) -> Result<Box<dyn ImageBackend>, ConfigError> {
        match config.backend {
            BackendKind::Remote => {
                let token =
                    config
                        .replicate_token
                        .clone()
                        .ok_or(ConfigError::MissingCredential {
                            backend: "remote",
                            var: "REPLICATE_API_TOKEN",
                        })?;
                Ok(Box::new(ReplicateBackend::new(token, store.clone())))
            }
            BackendKind::Local => Ok(Box::new(LocalBackend::new(
                config.local_steps,
                config.guidance_scale,
                store.clone(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(backend: &str, token: Option<&str>) -> Config {
        Config::from_lookup(|var| match var {
            "REELSMITH_BACKEND" => Some(backend.to_string()),
            "REPLICATE_API_TOKEN" => token.map(str::to_string),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_factory_requires_token_for_remote() {
        let store = AssetStore::new("/tmp/reelsmith-test");
        let err = match BackendFactory::create(&config_with("remote", None), &store) {
            Ok(_) => panic!("expected error"),
            Err(e) => e,
        };
        assert!(matches!(err, ConfigError::MissingCredential { backend: "remote", .. }));
    }

    #[test]
    fn test_factory_builds_both_kinds() {
        let store = AssetStore::new("/tmp/reelsmith-test");
        let remote =
            BackendFactory::create(&config_with("remote", Some("r8_test")), &store).unwrap();
        assert_eq!(remote.kind(), BackendKind::Remote);

        let local = BackendFactory::create(&config_with("local", None), &store).unwrap();
        assert_eq!(local.kind(), BackendKind::Local);
    }
}
