/// Image generation pipeline.
///
/// Turns a prompt plus a project's parameters into one image file in
/// the project's asset directory, streaming progress events while the
/// backend works. Two backends sit behind one trait: a Replicate
/// remote variant and an in-process local sampler.
use thiserror::Error;

pub mod backends;
pub mod enhancer;
pub mod progress;
pub mod prompt;

pub use backends::{BackendFactory, ImageBackend};
pub use enhancer::Enhancer;
pub use progress::{ProgressEvent, ProgressSink};
pub use prompt::{truncate_prompt, MAX_PROMPT_CHARS};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("authentication failed; check REPLICATE_API_TOKEN")]
    Auth,
    #[error("rate limited or out of quota")]
    RateLimited,
    #[error("generation service error ({status}): {detail}")]
    Service { status: u16, detail: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("generation timed out")]
    TimedOut,
    #[error("generation failed: {0}")]
    Failed(String),
    #[error("backend configuration error: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("image encode error: {0}")]
    Encode(#[from] image::ImageError),
}
