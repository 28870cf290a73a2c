//! Where the CLI keeps its own files

use std::path::PathBuf;

use crate::errors::CliError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

pub const HOME_ENV: &str = "BUILDSHIP_HOME";

/// Everything lives under one base directory, `~/.buildship` by default:
///
/// ```text
/// settings.json
/// version-cache.json
/// logs/
/// staging/deploy-<uuid>/app.zip
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn from_env() -> Self {
        match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => Self::new(home),
            _ => Self::default(),
        }
    }

    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    pub fn version_cache_file(&self) -> File {
        File::new(self.base_dir.join("version-cache.json"))
    }

    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Per-run archive directories are created under here
    pub fn staging_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("staging"))
    }

    pub async fn setup(&self) -> Result<(), CliError> {
        self.logs_dir().create().await?;
        self.staging_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".buildship"))
    }
}
