//! Cache entry naming and enumeration
//!
//! Every installed package version lives in its own directory under the
//! storage root, named `_<sanitized>@<version>@<name>` where `sanitized` is
//! the package name with its first `/` replaced by `_`. The name alone is
//! enough to reconstruct the path, so no separate index is kept.

use super::ResolvedPackage;
use crate::error::{TrellisError, TrellisResult};
use semver::Version;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Replace the scope separator so the prefix is a single path component
pub fn sanitize_name(name: &str) -> String {
    name.replacen('/', "_", 1)
}

/// Relative directory name of a cached package version
pub fn entry_dir_name(name: &str, version: &Version) -> String {
    format!("_{}@{}@{}", sanitize_name(name), version, name)
}

/// Absolute location of a cached package version
pub fn cache_path(store_dir: &Path, name: &str, version: &Version) -> PathBuf {
    store_dir.join(entry_dir_name(name, version))
}

/// A materialized package version found in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
}

impl CacheEntry {
    /// Parse a store-relative entry name back into (name, version).
    ///
    /// Scoped packages nest one level (`_@scope_pkg@1.0.0@@scope/pkg`), so
    /// `relative` uses `/` between the two components.
    pub fn parse(store_dir: &Path, relative: &str) -> Option<Self> {
        let rest = relative.strip_prefix('_')?;
        // A scoped sanitized name starts with '@'; skip it when splitting
        let split = rest.get(1..)?.find('@')? + 1;
        let sanitized = &rest[..split];
        let (version, name) = rest[split + 1..].split_once('@')?;

        if name.is_empty() || sanitize_name(name) != sanitized {
            return None;
        }
        let version = Version::parse(version).ok()?;

        Some(Self {
            path: cache_path(store_dir, name, &version),
            name: name.to_string(),
            version,
        })
    }

    /// Resolved package this entry materializes
    pub fn package(&self) -> ResolvedPackage {
        ResolvedPackage::new(self.name.clone(), self.version.clone())
    }
}

/// Enumerate every cache entry under `store_dir`, sorted by name then version.
///
/// A missing store is an empty cache.
pub async fn list_entries(store_dir: &Path) -> TrellisResult<Vec<CacheEntry>> {
    let mut entries = Vec::new();

    let mut dir = match tokio::fs::read_dir(store_dir).await {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
        Err(e) => {
            return Err(TrellisError::io(
                format!("reading cache directory {}", store_dir.display()),
                e,
            ))
        }
    };

    while let Some(item) = dir
        .next_entry()
        .await
        .map_err(|e| TrellisError::io("reading cache entry", e))?
    {
        let top = item.file_name().to_string_lossy().to_string();
        if !top.starts_with('_') || !item.path().is_dir() {
            continue;
        }

        if let Some(entry) = CacheEntry::parse(store_dir, &top) {
            entries.push(entry);
            continue;
        }

        // Scoped package: the real entry is one level deeper
        let mut children = match tokio::fs::read_dir(item.path()).await {
            Ok(c) => c,
            Err(_) => continue,
        };
        while let Ok(Some(child)) = children.next_entry().await {
            let relative = format!("{}/{}", top, child.file_name().to_string_lossy());
            if let Some(entry) = CacheEntry::parse(store_dir, &relative) {
                entries.push(entry);
            }
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
    debug!("Found {} cache entries in {}", entries.len(), store_dir.display());
    Ok(entries)
}
