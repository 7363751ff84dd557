//! Error types for Trellis
//!
//! All modules use `TrellisResult<T>` as their return type.

use crate::lifecycle::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Trellis operations
pub type TrellisResult<T> = Result<T, TrellisError>;

/// Exit code reported when the child process could not be started at all
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// All errors that can occur in Trellis
#[derive(Error, Debug)]
pub enum TrellisError {
    // Resolution errors
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Package entry not found for {package} (searched from {searched})")]
    EntryNotFound { package: String, searched: PathBuf },

    #[error("No published version found for {0}")]
    VersionNotFound(String),

    #[error("Registry request failed for {package}: {reason}")]
    Registry { package: String, reason: String },

    // Installation errors
    #[error("Install of {package} failed: {stderr}")]
    InstallFailed { package: String, stderr: String },

    #[error("Invalid package manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Home directory could not be determined")]
    HomeNotFound,

    // Lifecycle errors
    #[error("Host environment check failed: {0}")]
    Environment(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{phase} phase failed: {source}")]
    PhaseFailure {
        phase: Phase,
        #[source]
        source: Box<TrellisError>,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Failed to start {command}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl TrellisError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a registry error
    pub fn registry(package: impl Into<String>, reason: impl ToString) -> Self {
        Self::Registry {
            package: package.into(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code this error maps to
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SpawnFailed { .. } => EXIT_SPAWN_FAILED,
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownCommand(_) => Some("Add the command under [commands] in config.toml"),
            Self::EntryNotFound { .. } => {
                Some("The package.json of the command package must declare a \"main\" field")
            }
            Self::SpawnFailed { .. } => Some("Check that node is installed and on PATH"),
            Self::InstallFailed { .. } => Some("Run with -vv to see the installer invocation"),
            Self::HomeNotFound => Some("Set TRELLIS_HOME or pass --home"),
            _ => None,
        }
    }
}
