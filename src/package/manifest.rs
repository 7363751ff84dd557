//! Package manifest (`package.json`) discovery
//!
//! Only two facts are read from a manifest: the package `name` and the
//! `main` entry file.

use crate::error::{TrellisError, TrellisResult};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Manifest file name
pub const MANIFEST_FILE: &str = "package.json";

/// The subset of `package.json` the engine relies on
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub main: Option<String>,
}

impl PackageManifest {
    /// Read and parse the manifest inside `dir`
    pub async fn from_dir(dir: &Path) -> TrellisResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| TrellisError::io(format!("reading {}", path.display()), e))?;

        serde_json::from_str(&content).map_err(|e| TrellisError::ManifestInvalid {
            path,
            reason: e.to_string(),
        })
    }
}

/// Nearest directory at or above `start` that contains a manifest
pub fn find_package_root(start: &Path) -> Option<PathBuf> {
    let start = std::path::absolute(start).ok()?;
    start
        .ancestors()
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
        .map(Path::to_path_buf)
}

/// Resolve the entry file of the package containing `start`.
///
/// `None` when no manifest is found or it declares no `main`.
pub async fn entry_file(start: &Path) -> TrellisResult<Option<PathBuf>> {
    let Some(root) = find_package_root(start) else {
        debug!("No {} found above {}", MANIFEST_FILE, start.display());
        return Ok(None);
    };

    let manifest = PackageManifest::from_dir(&root).await?;
    match manifest.main.as_deref().map(str::trim) {
        Some(main) if !main.is_empty() => Ok(Some(format_path(&normalize(&root.join(main))))),
        _ => {
            debug!("{} declares no main entry", root.join(MANIFEST_FILE).display());
            Ok(None)
        }
    }
}

/// Lexically resolve `.` and `..` components
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Use forward slashes so the path can be handed to any loader verbatim
fn format_path(path: &Path) -> PathBuf {
    if std::path::MAIN_SEPARATOR == '/' {
        path.to_path_buf()
    } else {
        PathBuf::from(path.to_string_lossy().replace('\\', "/"))
    }
}
