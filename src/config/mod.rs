//! Configuration management for Trellis

pub mod schema;

pub use schema::Config;

use crate::error::{TrellisError, TrellisResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Default home directory name under the user's home
pub const DEFAULT_HOME_DIR: &str = ".trellis";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("trellis")
            .join("config.toml")
    }

    /// Resolve the trellis home directory.
    ///
    /// An explicit value (flag, env or config) wins; otherwise `~/.trellis`.
    pub fn home_dir(explicit: Option<&Path>) -> TrellisResult<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_HOME_DIR))
            .ok_or(TrellisError::HomeNotFound)
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> TrellisResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> TrellisResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| TrellisError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| TrellisError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("nonexistent.toml"));

        let config = manager.load().await.unwrap();
        assert_eq!(config.installer.program, "npm");
    }

    #[tokio::test]
    async fn load_reads_sections_and_commands() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[registry]\nurl = \"http://localhost:4873\"\n\n[commands]\npage = \"@acme/page\"\n",
        )
        .unwrap();

        let loaded = ConfigManager::with_path(path).load().await.unwrap();

        assert_eq!(loaded.registry.url, "http://localhost:4873");
        assert_eq!(loaded.commands["page"], "@acme/page");
        assert_eq!(loaded.installer.program, "npm");
    }

    #[tokio::test]
    async fn invalid_file_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[registry\nurl = 1").unwrap();

        let err = ConfigManager::with_path(path.clone())
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, TrellisError::ConfigInvalid { path: p, .. } if p == path));
    }

    #[test]
    fn explicit_home_wins() {
        let home = ConfigManager::home_dir(Some(Path::new("/opt/trellis"))).unwrap();
        assert_eq!(home, PathBuf::from("/opt/trellis"));
    }
}
