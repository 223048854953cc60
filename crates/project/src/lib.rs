use std::path::PathBuf;

pub mod config;
pub mod registry;
pub mod store;

pub use config::{BackendKind, Config, ConfigError};
pub use registry::{Project, ProjectRegistry};
pub use store::{AssetStore, StoreError};

/// Default data root when `REELSMITH_DATA_DIR` is not set.
pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("reelsmith")
}
