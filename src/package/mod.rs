//! Versioned command packages and the on-disk module cache
//!
//! A [`Package`] is a lazily resolved handle: the `latest` sentinel is
//! swapped for a concrete version on first use and remembered for the rest
//! of the invocation, never across runs.
//!
//! # Locations
//!
//! | Location | exists | install / update | entry lookup |
//! |----------|--------|------------------|--------------|
//! | Shared   | cache path of resolved version | via [`Installer`] | from cache path |
//! | Override | override path itself | not available | from override path |

pub mod cache;
pub mod installer;
pub mod manifest;

pub use cache::{cache_path, list_entries, CacheEntry};
pub use installer::{Installer, NpmInstaller};
pub use manifest::PackageManifest;

use crate::error::{TrellisError, TrellisResult};
use crate::registry::Registry;
use semver::Version;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Requested version of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestedVersion {
    /// Resolve against the registry at use time
    Latest,
    /// A concrete published version
    Exact(Version),
}

impl FromStr for RequestedVersion {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "latest" => Ok(Self::Latest),
            v => Version::parse(v.trim_start_matches('v')).map(Self::Exact),
        }
    }
}

impl fmt::Display for RequestedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// A package name with a possibly unresolved version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub name: String,
    pub version: RequestedVersion,
}

impl PackageVersion {
    /// Request the latest published version of `name`
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: RequestedVersion::Latest,
        }
    }

    /// Request an exact version of `name`
    pub fn exact(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version: RequestedVersion::Exact(version),
        }
    }
}

/// A package pinned to a concrete version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: Version,
}

impl ResolvedPackage {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// `name@version` install spec
    pub fn spec(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Location of this version in the store
    pub fn cache_path(&self, store_dir: &Path) -> PathBuf {
        cache::cache_path(store_dir, &self.name, &self.version)
    }
}

/// Where a package's files live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLocation {
    /// Versioned entries under a shared store
    Shared { target_dir: PathBuf, store_dir: PathBuf },
    /// A local, unversioned checkout used as-is
    Override(PathBuf),
}

impl PackageLocation {
    /// Shared cache rooted at `target_dir`, storing under `node_modules`
    pub fn shared(target_dir: impl Into<PathBuf>) -> Self {
        let target_dir = target_dir.into();
        Self::Shared {
            store_dir: target_dir.join("node_modules"),
            target_dir,
        }
    }
}

/// Handle on one package within the module cache
pub struct Package {
    spec: PackageVersion,
    resolved: Option<Version>,
    location: PackageLocation,
    registry: Arc<dyn Registry>,
    installer: Arc<dyn Installer>,
}

impl Package {
    pub fn new(
        spec: PackageVersion,
        location: PackageLocation,
        registry: Arc<dyn Registry>,
        installer: Arc<dyn Installer>,
    ) -> Self {
        let resolved = match &spec.version {
            RequestedVersion::Exact(v) => Some(v.clone()),
            RequestedVersion::Latest => None,
        };
        Self {
            spec,
            resolved,
            location,
            registry,
            installer,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn location(&self) -> &PackageLocation {
        &self.location
    }

    /// Concrete version, once resolved
    pub fn resolved_version(&self) -> Option<&Version> {
        self.resolved.as_ref()
    }

    /// Pin the requested version, querying the registry for `latest` once
    pub async fn resolve(&mut self) -> TrellisResult<ResolvedPackage> {
        if let Some(version) = &self.resolved {
            return Ok(ResolvedPackage::new(self.spec.name.clone(), version.clone()));
        }

        let version = self.query_latest().await?;
        debug!("Resolved {}@latest to {}", self.spec.name, version);
        self.resolved = Some(version.clone());
        Ok(ResolvedPackage::new(self.spec.name.clone(), version))
    }

    /// Whether the package is present locally
    pub async fn exists(&mut self) -> TrellisResult<bool> {
        match self.location.clone() {
            PackageLocation::Shared { store_dir, .. } => {
                let resolved = self.resolve().await?;
                Ok(resolved.cache_path(&store_dir).exists())
            }
            PackageLocation::Override(path) => Ok(path.exists()),
        }
    }

    /// Materialize the resolved version in the store
    pub async fn install(&mut self) -> TrellisResult<()> {
        let (target_dir, store_dir) = self.shared_dirs("install")?;
        let resolved = self.resolve().await?;
        ensure_dir(&store_dir).await?;

        info!("Installing {}", resolved.spec());
        self.installer
            .install(&target_dir, &store_dir, &resolved)
            .await
    }

    /// Make sure the current latest version is cached and switch to it.
    ///
    /// Earlier versions stay in the store untouched.
    pub async fn update(&mut self) -> TrellisResult<Version> {
        let (target_dir, store_dir) = self.shared_dirs("update")?;
        let latest = ResolvedPackage::new(self.spec.name.clone(), self.query_latest().await?);

        if latest.cache_path(&store_dir).exists() {
            debug!("{} is already cached", latest.spec());
        } else {
            ensure_dir(&store_dir).await?;
            info!("Updating {} to {}", latest.name, latest.version);
            self.installer
                .install(&target_dir, &store_dir, &latest)
                .await?;
        }

        self.resolved = Some(latest.version.clone());
        Ok(latest.version)
    }

    /// Directory the package's files are read from
    pub async fn root_dir(&mut self) -> TrellisResult<PathBuf> {
        match self.location.clone() {
            PackageLocation::Shared { store_dir, .. } => {
                Ok(self.resolve().await?.cache_path(&store_dir))
            }
            PackageLocation::Override(path) => Ok(path),
        }
    }

    /// Absolute path of the manifest's `main` entry, if declared
    pub async fn entry_file_path(&mut self) -> TrellisResult<Option<PathBuf>> {
        let root = self.root_dir().await?;
        manifest::entry_file(&root).await
    }

    async fn query_latest(&self) -> TrellisResult<Version> {
        self.registry
            .latest_version(&self.spec.name)
            .await?
            .ok_or_else(|| TrellisError::VersionNotFound(self.spec.name.clone()))
    }

    fn shared_dirs(&self, action: &str) -> TrellisResult<(PathBuf, PathBuf)> {
        match &self.location {
            PackageLocation::Shared {
                target_dir,
                store_dir,
            } => Ok((target_dir.clone(), store_dir.clone())),
            PackageLocation::Override(path) => Err(TrellisError::User(format!(
                "cannot {} {}: it is served from {}",
                action,
                self.spec.name,
                path.display()
            ))),
        }
    }
}

async fn ensure_dir(dir: &Path) -> TrellisResult<()> {
    if !dir.exists() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| TrellisError::io(format!("creating directory {}", dir.display()), e))?;
    }
    Ok(())
}
