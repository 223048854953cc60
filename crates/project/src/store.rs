/// On-disk asset layout: `<root>/<slug>/{images,audio,exports}`,
/// created on demand. Writers put incomplete files next to their
/// final path with a `.tmp` suffix and rename into place, so listing
/// by extension never surfaces a partial file.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::registry::Project;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path:?} is outside the {slug} image directory")]
    ForeignPath { slug: String, path: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &Project) -> PathBuf {
        self.root.join(&project.slug)
    }

    pub fn images_dir(&self, project: &Project) -> PathBuf {
        self.project_dir(project).join("images")
    }

    pub fn audio_dir(&self, project: &Project) -> PathBuf {
        self.project_dir(project).join("audio")
    }

    pub fn exports_dir(&self, project: &Project) -> PathBuf {
        self.project_dir(project).join("exports")
    }

    pub fn ensure_dirs(&self, project: &Project) -> Result<(), StoreError> {
        fs::create_dir_all(self.images_dir(project))?;
        fs::create_dir_all(self.audio_dir(project))?;
        fs::create_dir_all(self.exports_dir(project))?;
        Ok(())
    }

    /// Images directly under the project's image directory, sorted by
    /// filename. Timestamp-prefixed names sort chronologically.
    pub fn list_images(&self, project: &Project) -> Vec<PathBuf> {
        list_with_extensions(&self.images_dir(project), IMAGE_EXTENSIONS)
    }

    pub fn list_audio(&self, project: &Project) -> Vec<PathBuf> {
        list_with_extensions(&self.audio_dir(project), AUDIO_EXTENSIONS)
    }

    /// Remove one generated image. Paths outside the project's image
    /// directory are refused, so a stale gallery entry can never
    /// delete another project's file.
    pub fn delete_image(&self, project: &Project, path: &Path) -> Result<(), StoreError> {
        let dir = self.images_dir(project).canonicalize()?;
        let target = path.canonicalize()?;
        if !target.starts_with(&dir) {
            return Err(StoreError::ForeignPath {
                slug: project.slug.clone(),
                path: path.to_path_buf(),
            });
        }
        debug!(path = %target.display(), "deleting image");
        fs::remove_file(&target)?;
        Ok(())
    }
}

/// Timestamped, prompt-slugged image filename:
/// `YYYYMMDD_HHMMSS_<slug>.png`.
pub fn image_filename(prompt: &str) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let slug = prompt_slug(prompt);
    if slug.is_empty() {
        format!("{stamp}_image.png")
    } else {
        format!("{stamp}_{slug}.png")
    }
}

pub fn export_filename() -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("slideshow_{stamp}.mp4")
}

fn prompt_slug(prompt: &str) -> String {
    let kept: String = prompt
        .chars()
        .take(30)
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim().replace(' ', "_")
}

fn list_with_extensions(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProjectRegistry;

    fn store_and_project() -> (tempfile::TempDir, AssetStore, Project) {
        let tmp = tempfile::tempdir().unwrap();
        let store = AssetStore::new(tmp.path());
        let project = ProjectRegistry::builtin().get("wedding-vision").unwrap().clone();
        (tmp, store, project)
    }

    #[test]
    fn test_ensure_dirs_creates_layout() {
        let (_tmp, store, project) = store_and_project();
        store.ensure_dirs(&project).unwrap();
        assert!(store.images_dir(&project).is_dir());
        assert!(store.audio_dir(&project).is_dir());
        assert!(store.exports_dir(&project).is_dir());
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let (_tmp, store, project) = store_and_project();
        store.ensure_dirs(&project).unwrap();
        let dir = store.images_dir(&project);
        fs::write(dir.join("20240102_b.png"), b"x").unwrap();
        fs::write(dir.join("20240101_a.png"), b"x").unwrap();
        fs::write(dir.join("incomplete.png.tmp"), b"x").unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();

        let images = store.list_images(&project);
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["20240101_a.png", "20240102_b.png"]);
    }

    #[test]
    fn test_missing_dir_lists_empty() {
        let (_tmp, store, project) = store_and_project();
        assert!(store.list_images(&project).is_empty());
    }

    #[test]
    fn test_delete_image_removes_file() {
        let (_tmp, store, project) = store_and_project();
        store.ensure_dirs(&project).unwrap();
        let path = store.images_dir(&project).join("a.png");
        fs::write(&path, b"x").unwrap();

        store.delete_image(&project, &path).unwrap();
        assert!(!path.exists());
        assert!(store.list_images(&project).is_empty());
    }

    #[test]
    fn test_delete_refuses_other_projects_image() {
        let (_tmp, store, project) = store_and_project();
        let registry = ProjectRegistry::builtin();
        let other = registry.get("latin-bible").unwrap();
        store.ensure_dirs(&project).unwrap();
        store.ensure_dirs(other).unwrap();
        let foreign = store.images_dir(other).join("keep.png");
        fs::write(&foreign, b"x").unwrap();

        let err = store.delete_image(&project, &foreign).unwrap_err();
        assert!(matches!(err, StoreError::ForeignPath { .. }));
        assert!(foreign.exists());
    }

    #[test]
    fn test_image_filename_slug() {
        let name = image_filename("A misty forest, golden hour!");
        assert!(name.ends_with(".png"));
        assert!(name.contains("A_misty_forest_golden_hour"));
        assert!(!name.contains('!'));
    }

    #[test]
    fn test_image_filename_empty_prompt() {
        let name = image_filename("!!!");
        assert!(name.ends_with("_image.png"));
    }
}
