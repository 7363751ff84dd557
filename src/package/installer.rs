//! External package installer
//!
//! Materializes one resolved package version, with its dependencies, at its
//! cache path. The npm installer works in a per-process staging directory and
//! renames the finished package into the store as its last step.

use super::ResolvedPackage;
use crate::error::{TrellisError, TrellisResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Directory under the target dir holding in-progress installs
const STAGING_DIR: &str = ".staging";

/// Staging directories untouched for this long belong to crashed installs
const STALE_STAGING_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Something that can materialize a package version in the store
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install `package` so that it ends up at its cache path under `store_dir`
    async fn install(
        &self,
        target_dir: &Path,
        store_dir: &Path,
        package: &ResolvedPackage,
    ) -> TrellisResult<()>;
}

/// Installer driving an npm-compatible client
#[derive(Debug, Clone)]
pub struct NpmInstaller {
    program: String,
    registry_url: String,
    extra_args: Vec<String>,
}

impl NpmInstaller {
    /// Create an installer for the given client program and registry
    pub fn new(program: impl Into<String>, registry_url: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            registry_url: registry_url.into(),
            extra_args: vec![],
        }
    }

    /// Append extra arguments to every install invocation
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn staging_dir(target_dir: &Path, package: &ResolvedPackage) -> PathBuf {
        target_dir.join(STAGING_DIR).join(format!(
            "{}@{}.{}",
            super::cache::sanitize_name(&package.name),
            package.version,
            std::process::id()
        ))
    }

    fn command(&self, staging: &Path, package: &ResolvedPackage) -> (Command, String) {
        let mut args: Vec<String> = vec![
            "install".to_string(),
            "--prefix".to_string(),
            staging.display().to_string(),
            "--no-save".to_string(),
            "--no-package-lock".to_string(),
            "--no-audit".to_string(),
            "--no-fund".to_string(),
            "--registry".to_string(),
            self.registry_url.clone(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args.push(package.spec());

        let invocation = format!("{} {}", self.program, args.join(" "));

        // npm ships as a .cmd shim on Windows
        #[cfg(windows)]
        let cmd = {
            let mut c = Command::new("cmd");
            c.arg("/c").arg(&self.program).args(&args);
            c
        };
        #[cfg(not(windows))]
        let cmd = {
            let mut c = Command::new(&self.program);
            c.args(&args);
            c
        };

        (cmd, invocation)
    }
}

#[async_trait]
impl Installer for NpmInstaller {
    async fn install(
        &self,
        target_dir: &Path,
        store_dir: &Path,
        package: &ResolvedPackage,
    ) -> TrellisResult<()> {
        let staging = Self::staging_dir(target_dir, package);
        sweep_stale_staging(&target_dir.join(STAGING_DIR), STALE_STAGING_AGE, &staging).await;
        if staging.exists() {
            remove_dir(&staging).await?;
        }
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| TrellisError::io(format!("creating {}", staging.display()), e))?;

        let (mut cmd, invocation) = self.command(&staging, package);
        debug!("Executing: {}", invocation);

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let result = match output {
            Ok(output) if output.status.success() => promote(&staging, store_dir, package).await,
            Ok(output) => Err(TrellisError::InstallFailed {
                package: package.spec(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Err(e) => Err(TrellisError::command_failed(invocation, e)),
        };

        if let Err(e) = remove_dir(&staging).await {
            warn!("Failed to clean staging directory: {}", e);
        }

        if result.is_ok() {
            info!("Installed {}", package.spec());
        }
        result
    }
}

/// Move the staged package into the store.
///
/// Hoisted dependencies are moved into the package's own `node_modules`
/// first so the entry can still resolve them after the final rename.
async fn promote(staging: &Path, store_dir: &Path, package: &ResolvedPackage) -> TrellisResult<()> {
    let modules = staging.join("node_modules");
    let installed = modules.join(&package.name);
    if !installed.join(super::manifest::MANIFEST_FILE).is_file() {
        return Err(TrellisError::InstallFailed {
            package: package.spec(),
            stderr: format!("installer produced no package at {}", installed.display()),
        });
    }

    let nested = installed.join("node_modules");
    for (dep, relative) in hoisted_dependencies(&modules, &package.name).await? {
        let dest = nested.join(&relative);
        if dest.exists() {
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TrellisError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::rename(&dep, &dest)
            .await
            .map_err(|e| TrellisError::io(format!("moving dependency {}", relative), e))?;
    }

    let dest = package.cache_path(store_dir);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| TrellisError::io(format!("creating {}", parent.display()), e))?;
    }

    match fs::rename(&installed, &dest).await {
        Ok(()) => Ok(()),
        Err(_) if dest.exists() => {
            debug!("{} appeared concurrently, keeping existing entry", dest.display());
            Ok(())
        }
        Err(e) => Err(TrellisError::io(
            format!("moving package into {}", dest.display()),
            e,
        )),
    }
}

/// Top-level packages in `modules` other than `name`, as (path, relative name)
async fn hoisted_dependencies(
    modules: &Path,
    name: &str,
) -> TrellisResult<Vec<(PathBuf, String)>> {
    let mut found = Vec::new();
    for top in read_names(modules).await? {
        if top.starts_with('.') {
            continue;
        }
        if top.starts_with('@') {
            for child in read_names(&modules.join(&top)).await? {
                let relative = format!("{}/{}", top, child);
                if relative != name {
                    found.push((modules.join(&top).join(&child), relative));
                }
            }
        } else if top != name {
            found.push((modules.join(&top), top));
        }
    }
    Ok(found)
}

/// Remove staging directories older than `max_age`, except `keep`.
///
/// Best effort: failures are logged and skipped. Returns how many were removed.
async fn sweep_stale_staging(root: &Path, max_age: Duration, keep: &Path) -> usize {
    let Ok(names) = read_names(root).await else {
        return 0;
    };

    let mut removed = 0;
    for name in names {
        let dir = root.join(&name);
        if dir == keep {
            continue;
        }
        let age = fs::metadata(&dir)
            .await
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok());
        if !matches!(age, Some(age) if age >= max_age) {
            continue;
        }
        match remove_dir(&dir).await {
            Ok(()) => {
                debug!("Removed stale staging directory {}", dir.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove stale staging directory: {}", e),
        }
    }
    removed
}

async fn read_names(dir: &Path) -> TrellisResult<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| TrellisError::io(format!("reading {}", dir.display()), e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| TrellisError::io(format!("reading {}", dir.display()), e))?
    {
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    Ok(names)
}

async fn remove_dir(dir: &Path) -> TrellisResult<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TrellisError::io(format!("removing {}", dir.display()), e)),
    }
}
