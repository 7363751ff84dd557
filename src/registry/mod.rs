//! Package registry client
//!
//! Resolves package names to published version metadata from an
//! npm-compatible registry. Unknown packages yield an empty version list;
//! transport failures and unexpected statuses are errors.

mod npm;

pub use npm::{metadata_url, NpmRegistry, PackageMetadata};

use crate::error::TrellisResult;
use async_trait::async_trait;
use semver::Version;

/// Remote source of package version metadata
#[async_trait]
pub trait Registry: Send + Sync {
    /// All published version strings for a package (empty if unknown)
    async fn list_versions(&self, name: &str) -> TrellisResult<Vec<String>>;

    /// Version currently tagged as latest, if the package is published
    async fn latest_version(&self, name: &str) -> TrellisResult<Option<Version>>;
}

/// Published versions strictly greater than `base`, highest first.
///
/// Unparseable and prerelease versions are skipped.
pub fn newer_versions(base: &Version, versions: &[String]) -> Vec<Version> {
    let mut newer: Vec<Version> = versions
        .iter()
        .filter_map(|v| Version::parse(v).ok())
        .filter(|v| v.pre.is_empty() && v > base)
        .collect();
    newer.sort_by(|a, b| b.cmp(a));
    newer
}

/// Highest published version of `name` above `base`, if any
pub async fn newest_version_above(
    registry: &dyn Registry,
    name: &str,
    base: &Version,
) -> TrellisResult<Option<Version>> {
    let versions = registry.list_versions(name).await?;
    Ok(newer_versions(base, &versions).into_iter().next())
}
