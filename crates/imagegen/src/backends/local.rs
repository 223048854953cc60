/// Local in-process backend.
///
/// A self-contained CPU sampler: the frame starts as prompt-seeded
/// noise in a low-resolution latent buffer and is refined over a
/// bounded number of passes toward a palette derived from the same
/// seed, then upscaled to the 9:16 target and written as PNG. One
/// progress event per pass. Deterministic for a given prompt and
/// step count, and runs on any machine with no model weights.
use std::path::PathBuf;

use async_trait::async_trait;
use image::{imageops, ImageFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::info;

use super::ImageBackend;
use crate::progress::ProgressSink;
use crate::prompt::effective_prompt;
use crate::GenerateError;
use project::{store, AssetStore, BackendKind, Project};

const TARGET_WIDTH: u32 = 1080;
const TARGET_HEIGHT: u32 = 1920;
/// Sampling happens at quarter resolution, like a latent space.
const LATENT_WIDTH: u32 = 270;
const LATENT_HEIGHT: u32 = 480;

pub struct LocalBackend {
    steps: u32,
    guidance_scale: f32,
    store: AssetStore,
}

impl LocalBackend {
    pub fn new(steps: u32, guidance_scale: f32, store: AssetStore) -> Self {
        Self {
            steps,
            guidance_scale,
            store,
        }
    }
}

#[async_trait]
impl ImageBackend for LocalBackend {
    fn name(&self) -> &str {
        "Local"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn generate(
        &self,
        project: &Project,
        prompt: &str,
        progress: &ProgressSink,
    ) -> Result<PathBuf, GenerateError> {
        if self.steps == 0 {
            return Err(GenerateError::Backend(
                "REELSMITH_LOCAL_STEPS must be at least 1".to_string(),
            ));
        }
        self.store.ensure_dirs(project).map_err(|e| match e {
            project::StoreError::Io(io) => GenerateError::Io(io),
            other => GenerateError::Backend(other.to_string()),
        })?;

        let submitted = effective_prompt(project.trigger.as_deref(), prompt);
        let seed_bytes = Sha256::digest(submitted.as_bytes());

        let mut sampler = Sampler::seeded(&seed_bytes, self.guidance_scale);
        for step in 1..=self.steps {
            sampler.refine(step, self.steps);
            progress.step(step, self.steps);
        }

        let latent = sampler.into_image();
        let frame = imageops::resize(
            &latent,
            TARGET_WIDTH,
            TARGET_HEIGHT,
            imageops::FilterType::Lanczos3,
        );

        let dest = self
            .store
            .images_dir(project)
            .join(store::image_filename(prompt));
        let tmp = dest.with_extension("png.tmp");
        frame.save_with_format(&tmp, ImageFormat::Png)?;
        std::fs::rename(&tmp, &dest)?;

        info!(path = %dest.display(), steps = self.steps, "local image written");
        Ok(dest)
    }
}

struct Sampler {
    field: Vec<[f32; 3]>,
    top: [f32; 3],
    bottom: [f32; 3],
    guidance: f32,
}

impl Sampler {
    fn seeded(digest: &[u8], guidance_scale: f32) -> Self {
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));

        let pixels = (LATENT_WIDTH * LATENT_HEIGHT) as usize;
        let mut field = Vec::with_capacity(pixels);
        for _ in 0..pixels {
            field.push([rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()]);
        }

        Self {
            field,
            top: anchor_color(&digest[8..11]),
            bottom: anchor_color(&digest[11..14]),
            guidance: (guidance_scale / 10.0).clamp(0.05, 0.95),
        }
    }

    /// One denoising pass: neighborhood smoothing, then a pull toward
    /// the palette gradient that strengthens as steps progress.
    fn refine(&mut self, step: u32, total: u32) {
        let w = LATENT_WIDTH as usize;
        let h = LATENT_HEIGHT as usize;
        let t = step as f32 / total as f32;
        let pull = self.guidance * t;

        let prev = self.field.clone();
        for y in 0..h {
            let y_frac = y as f32 / (h - 1).max(1) as f32;
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                let mut count = 0.0f32;
                for (dx, dy) in [(0i64, 0i64), (-1, 0), (1, 0), (0, -1), (0, 1)] {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx >= 0 && ny >= 0 && (nx as usize) < w && (ny as usize) < h {
                        let p = prev[ny as usize * w + nx as usize];
                        acc[0] += p[0];
                        acc[1] += p[1];
                        acc[2] += p[2];
                        count += 1.0;
                    }
                }
                let smoothed = [acc[0] / count, acc[1] / count, acc[2] / count];
                let target = lerp3(self.top, self.bottom, y_frac);
                self.field[y * w + x] = lerp3(smoothed, target, pull);
            }
        }
    }

    fn into_image(self) -> RgbImage {
        let w = LATENT_WIDTH as usize;
        RgbImage::from_fn(LATENT_WIDTH, LATENT_HEIGHT, |x, y| {
            let p = self.field[y as usize * w + x as usize];
            Rgb([to_u8(p[0]), to_u8(p[1]), to_u8(p[2])])
        })
    }
}

/// Lift a digest triple into a color bright enough to read on a phone
/// screen.
fn anchor_color(bytes: &[u8]) -> [f32; 3] {
    [
        0.25 + 0.75 * (bytes[0] as f32 / 255.0),
        0.25 + 0.75 * (bytes[1] as f32 / 255.0),
        0.25 + 0.75 * (bytes[2] as f32 / 255.0),
    ]
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressEvent;
    use project::ProjectRegistry;

    fn backend_in(tmp: &tempfile::TempDir, steps: u32) -> (LocalBackend, Project) {
        let store = AssetStore::new(tmp.path());
        let project = ProjectRegistry::builtin()
            .get("wedding-vision")
            .unwrap()
            .clone();
        (LocalBackend::new(steps, 7.5, store), project)
    }

    #[tokio::test]
    async fn test_generates_one_png_with_step_events() {
        let tmp = tempfile::tempdir().unwrap();
        let (backend, project) = backend_in(&tmp, 4);
        let (tx, rx) = crossbeam_channel::unbounded();
        let sink = ProgressSink::new(tx);

        let path = backend
            .generate(&project, "a misty forest", &sink)
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "png");
        assert!(path.starts_with(tmp.path().join("wedding-vision").join("images")));

        let steps: Vec<_> = rx.try_iter().collect();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0], ProgressEvent::Step { current: 1, total: 4 });
        assert_eq!(steps[3], ProgressEvent::Step { current: 4, total: 4 });
    }

    #[tokio::test]
    async fn test_deterministic_for_same_prompt() {
        let tmp = tempfile::tempdir().unwrap();
        let (backend, project) = backend_in(&tmp, 3);

        let first = backend
            .generate(&project, "golden dunes", &ProgressSink::disabled())
            .await
            .unwrap();
        let first_bytes = std::fs::read(&first).unwrap();

        let second = backend
            .generate(&project, "golden dunes", &ProgressSink::disabled())
            .await
            .unwrap();
        let second_bytes = std::fs::read(&second).unwrap();
        assert_eq!(first_bytes, second_bytes);
    }

    #[tokio::test]
    async fn test_zero_steps_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (backend, project) = backend_in(&tmp, 0);
        let err = backend
            .generate(&project, "anything", &ProgressSink::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Backend(_)));
        assert!(AssetStore::new(tmp.path()).list_images(&project).is_empty());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        // Rename happens after save, so the images dir only ever
        // gains the final name; verified indirectly through listing.
        let tmp = tempfile::tempdir().unwrap();
        let (backend, project) = backend_in(&tmp, 2);
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(async {
            backend
                .generate(&project, "city at night", &ProgressSink::disabled())
                .await
                .unwrap();
        });
        let dir = AssetStore::new(tmp.path()).images_dir(&project);
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
