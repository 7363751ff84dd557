//! In-memory registry and installer doubles shared by unit tests

use crate::error::TrellisResult;
use crate::package::{Installer, ResolvedPackage};
use crate::registry::Registry;
use async_trait::async_trait;
use semver::Version;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Registry answering from a mutable in-memory table
#[derive(Default)]
pub struct FakeRegistry {
    packages: Mutex<HashMap<String, Vec<String>>>,
    list_calls: AtomicUsize,
    latest_calls: AtomicUsize,
}

impl FakeRegistry {
    pub fn with_latest(name: &str, version: &str) -> Self {
        let registry = Self::default();
        registry.publish(name, version);
        registry
    }

    pub fn publish(&self, name: &str, version: &str) {
        self.packages
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push(version.to_string());
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.latest_calls() + self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn list_versions(&self, name: &str) -> TrellisResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .packages
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_version(&self, name: &str) -> TrellisResult<Option<Version>> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .packages
            .lock()
            .unwrap()
            .get(name)
            .and_then(|versions| versions.iter().filter_map(|v| Version::parse(v).ok()).max()))
    }
}

/// Installer that writes a minimal package straight into the cache path
pub struct FakeInstaller {
    main: Option<String>,
    script: Option<String>,
    executable: bool,
    installed: Mutex<Vec<String>>,
}

impl FakeInstaller {
    /// Packages declare `main` but ship no entry file
    pub fn with_main(main: &str) -> Self {
        Self {
            main: Some(main.to_string()),
            script: None,
            executable: false,
            installed: Mutex::new(vec![]),
        }
    }

    /// Packages whose manifest has no `main`
    pub fn without_main() -> Self {
        Self {
            main: None,
            script: None,
            executable: false,
            installed: Mutex::new(vec![]),
        }
    }

    /// Packages whose `main` is an executable shell script
    pub fn with_script(main: &str, body: &str) -> Self {
        Self {
            main: Some(main.to_string()),
            script: Some(body.to_string()),
            executable: true,
            installed: Mutex::new(vec![]),
        }
    }

    /// Packages whose `main` is a plain source file, e.g. JavaScript
    pub fn with_source(main: &str, source: &str) -> Self {
        Self {
            main: Some(main.to_string()),
            script: Some(source.to_string()),
            executable: false,
            installed: Mutex::new(vec![]),
        }
    }

    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Installer for FakeInstaller {
    async fn install(
        &self,
        _target_dir: &Path,
        store_dir: &Path,
        package: &ResolvedPackage,
    ) -> TrellisResult<()> {
        let dest = package.cache_path(store_dir);
        std::fs::create_dir_all(&dest).unwrap();

        let manifest = match &self.main {
            Some(main) => serde_json::json!({ "name": package.name, "version": package.version.to_string(), "main": main }),
            None => serde_json::json!({ "name": package.name, "version": package.version.to_string() }),
        };
        std::fs::write(dest.join("package.json"), manifest.to_string()).unwrap();

        if let (Some(main), Some(body)) = (&self.main, &self.script) {
            let path = dest.join(main);
            if self.executable {
                write_script(&path, body);
            } else {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).unwrap();
                }
                std::fs::write(&path, body).unwrap();
            }
        }

        self.installed.lock().unwrap().push(package.spec());
        Ok(())
    }
}

/// Write an executable `#!/bin/sh` script
pub fn write_script(path: &Path, body: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
