use std::path::PathBuf;

use serde::Deserialize;

/// Upload storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per upload kind. Default: "./uploads".
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Largest accepted upload in bytes. Default: 10 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_max_upload_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}
