/// Static project registry.
///
/// A project bundles a generation model with display metadata. The set
/// is fixed at startup; there is no mutation API in the running
/// process.
use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Unique key, also the on-disk directory name.
    pub slug: String,

    /// Human-readable name shown in the sidebar.
    pub name: String,

    /// Model reference for the remote backend (`owner/name`).
    pub model: String,

    /// Trigger keyword prepended to every prompt, if any.
    pub trigger: Option<String>,

    /// One-line description shown under the name.
    pub description: String,
}

pub struct ProjectRegistry {
    projects: Vec<Project>,
}

impl ProjectRegistry {
    /// The built-in project set, insertion-ordered.
    pub fn builtin() -> Self {
        Self {
            projects: vec![
                Project {
                    slug: "wedding-vision".to_string(),
                    name: "Wedding Vision".to_string(),
                    model: "black-forest-labs/flux-schnell".to_string(),
                    trigger: Some("WDVSN style".to_string()),
                    description: "Cinematic wedding moodboards".to_string(),
                },
                Project {
                    slug: "latin-bible".to_string(),
                    name: "Latin Bible".to_string(),
                    model: "black-forest-labs/flux-dev".to_string(),
                    trigger: Some("LTNBBL style".to_string()),
                    description: "Illuminated manuscript scenes".to_string(),
                },
                Project {
                    slug: "dxp-albums".to_string(),
                    name: "DXP Albums".to_string(),
                    model: "stability-ai/sdxl".to_string(),
                    trigger: Some("DXPALB style".to_string()),
                    description: "Album cover concepts".to_string(),
                },
            ],
        }
    }

    pub fn get(&self, slug: &str) -> Result<&Project, ConfigError> {
        self.projects
            .iter()
            .find(|p| p.slug == slug)
            .ok_or_else(|| ConfigError::UnknownProject(slug.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
