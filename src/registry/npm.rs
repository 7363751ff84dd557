//! npm registry HTTP client

use super::Registry;
use crate::error::{TrellisError, TrellisResult};
use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Abbreviated metadata document, enough for version resolution
const ACCEPT_ABBREVIATED: &str = "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8";

/// Packuments of long-lived packages easily exceed ureq's default body limit
const MAX_METADATA_BYTES: u64 = 64 * 1024 * 1024;

/// Registry metadata for one package
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageMetadata {
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,

    #[serde(default)]
    pub versions: BTreeMap<String, serde_json::Value>,
}

impl PackageMetadata {
    /// Parse a registry metadata document
    pub fn parse(body: &str) -> TrellisResult<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Published version strings
    pub fn version_list(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }

    /// The `latest` dist-tag, falling back to the highest stable version
    pub fn latest(&self) -> Option<Version> {
        if let Some(tagged) = self
            .dist_tags
            .get("latest")
            .and_then(|v| Version::parse(v).ok())
        {
            return Some(tagged);
        }

        self.versions
            .keys()
            .filter_map(|v| Version::parse(v).ok())
            .filter(|v| v.pre.is_empty())
            .max()
    }
}

/// Build the metadata URL for a package.
///
/// Scoped names keep their `@` but encode the separator (`@scope%2fname`).
pub fn metadata_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name.replacen('/', "%2f", 1))
}

/// Registry client backed by a blocking ureq agent
#[derive(Clone)]
pub struct NpmRegistry {
    base_url: String,
    agent: ureq::Agent,
}

impl NpmRegistry {
    /// Create a client for the given registry base URL
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            base_url: base_url.into(),
            agent,
        }
    }

    /// Registry base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch metadata, `None` when the registry does not know the package
    pub async fn fetch_metadata(&self, name: &str) -> TrellisResult<Option<PackageMetadata>> {
        let url = metadata_url(&self.base_url, name);
        let agent = self.agent.clone();
        let package = name.to_string();

        debug!("Fetching registry metadata: {}", url);

        tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url, &package))
            .await
            .map_err(|e| TrellisError::Internal(format!("registry task failed: {}", e)))?
    }
}

fn fetch_blocking(
    agent: &ureq::Agent,
    url: &str,
    package: &str,
) -> TrellisResult<Option<PackageMetadata>> {
    let mut response = agent
        .get(url)
        .header("Accept", ACCEPT_ABBREVIATED)
        .call()
        .map_err(|e| TrellisError::registry(package, e))?;

    let status = response.status();
    if status.as_u16() == 404 {
        debug!("Package {} not found in registry", package);
        return Ok(None);
    }
    if !status.is_success() {
        return Err(TrellisError::registry(
            package,
            format!("{} returned HTTP {}", url, status.as_u16()),
        ));
    }

    let body = response
        .body_mut()
        .with_config()
        .limit(MAX_METADATA_BYTES)
        .read_to_string()
        .map_err(|e| TrellisError::registry(package, e))?;

    PackageMetadata::parse(&body).map(Some)
}

#[async_trait]
impl Registry for NpmRegistry {
    async fn list_versions(&self, name: &str) -> TrellisResult<Vec<String>> {
        Ok(self
            .fetch_metadata(name)
            .await?
            .map(|m| m.version_list())
            .unwrap_or_default())
    }

    async fn latest_version(&self, name: &str) -> TrellisResult<Option<Version>> {
        Ok(self.fetch_metadata(name).await?.and_then(|m| m.latest()))
    }
}
