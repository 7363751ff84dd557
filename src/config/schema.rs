//! Configuration schema for Trellis
//!
//! Configuration is stored at `~/.config/trellis/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default npm-compatible registry
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Registry name trellis itself is published under
pub const DEFAULT_SELF_PACKAGE: &str = "@trellis-cli/cli";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Package registry settings
    pub registry: RegistryConfig,

    /// Module cache settings
    pub cache: CacheConfig,

    /// External installer settings
    pub installer: InstallerConfig,

    /// Extra command name -> package name mappings
    pub commands: BTreeMap<String, String>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Warn when a newer trellis release is published
    pub check_updates: bool,

    /// Package checked for newer trellis releases
    pub self_package: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            check_updates: true,
            self_package: DEFAULT_SELF_PACKAGE.to_string(),
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URL of the registry
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

/// Module cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Trellis home directory (defaults to `~/.trellis`)
    pub home: Option<PathBuf>,

    /// Directory under home that holds installed command packages
    pub dir_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            home: None,
            dir_name: "dependencies".to_string(),
        }
    }
}

/// Installer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// npm-compatible client used to materialize packages
    pub program: String,

    /// Extra arguments appended to every install invocation
    pub extra_args: Vec<String>,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            extra_args: vec![],
        }
    }
}
