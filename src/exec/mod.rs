//! Execution dispatcher
//!
//! One dispatch resolves the package implementing a command, makes sure it
//! is in the module cache, locates its entry file and runs it in a child
//! process. The child inherits stdio and its exit code becomes ours.
//!
//! Steps are strictly sequential: install/update finishes before the entry
//! lookup, which finishes before the spawn. Concurrent trellis processes are
//! not coordinated.

pub mod bundle;
pub mod descriptor;
pub mod loader;

pub use bundle::ArgumentBundle;
pub use descriptor::CommandRegistry;
pub use loader::{loader_for, Loader, NativeLoader, NodeLoader};

use crate::error::{TrellisError, TrellisResult};
use crate::lifecycle::{BUNDLE_PROTOCOL, BUNDLE_PROTOCOL_ENV, HOST_VERSION_ENV};
use crate::package::{Installer, Package, PackageLocation, PackageVersion};
use crate::registry::Registry;
use crate::ui::{TaskSpinner, UiContext};
use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitCode, ExitStatus, Stdio};
use std::sync::Arc;
use tokio::process::Child;
use tracing::{debug, info, warn};

/// Where command packages come from for this invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Trellis home directory
    pub home_dir: PathBuf,

    /// Local package checkout that bypasses the cache entirely
    pub target_path: Option<PathBuf>,

    /// Directory under home holding installed packages
    pub cache_dir_name: String,
}

impl DispatchSettings {
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.into(),
            target_path: None,
            cache_dir_name: "dependencies".to_string(),
        }
    }

    pub fn with_target_path(mut self, path: Option<PathBuf>) -> Self {
        self.target_path = path;
        self
    }

    /// Root of the shared cache (`<home>/dependencies`)
    pub fn cache_root(&self) -> PathBuf {
        self.home_dir.join(&self.cache_dir_name)
    }

    /// Store holding versioned entries (`<home>/dependencies/node_modules`)
    pub fn store_dir(&self) -> PathBuf {
        self.cache_root().join("node_modules")
    }

    /// Package location; an override path wins over the shared cache
    pub fn location(&self) -> PackageLocation {
        match &self.target_path {
            Some(path) => PackageLocation::Override(path.clone()),
            None => PackageLocation::shared(self.cache_root()),
        }
    }
}

/// Resolves, materializes and runs command packages
pub struct Dispatcher {
    settings: DispatchSettings,
    commands: CommandRegistry,
    registry: Arc<dyn Registry>,
    installer: Arc<dyn Installer>,
    ui: UiContext,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        commands: CommandRegistry,
        registry: Arc<dyn Registry>,
        installer: Arc<dyn Installer>,
    ) -> Self {
        Self {
            settings,
            commands,
            registry,
            installer,
            ui: UiContext::non_interactive(),
        }
    }

    /// Use the given UI context for install progress
    pub fn with_ui(mut self, ui: UiContext) -> Self {
        self.ui = ui;
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Package implementing `command_name`; no I/O happens here
    pub fn package_for(&self, command_name: &str) -> TrellisResult<&str> {
        self.commands
            .package_for(command_name)
            .ok_or_else(|| TrellisError::UnknownCommand(command_name.to_string()))
    }

    /// Run `command_name` with `bundle`, returning the child's exit code
    pub async fn dispatch(&self, command_name: &str, bundle: &ArgumentBundle) -> TrellisResult<i32> {
        let package_name = self.package_for(command_name)?;

        let mut package = Package::new(
            PackageVersion::latest(package_name),
            self.settings.location(),
            self.registry.clone(),
            self.installer.clone(),
        );

        match &self.settings.target_path {
            Some(path) => debug!("Using {} from {}", package_name, path.display()),
            None => self.ensure_cached(&mut package).await?,
        }

        let Some(entry) = package.entry_file_path().await? else {
            return Err(TrellisError::EntryNotFound {
                package: package_name.to_string(),
                searched: package.root_dir().await?,
            });
        };
        debug!("Entry file: {}", entry.display());

        let wire = bundle.sanitized().to_wire()?;
        self.spawn(&entry, &wire).await
    }

    async fn ensure_cached(&self, package: &mut Package) -> TrellisResult<()> {
        let mut spinner = TaskSpinner::new(&self.ui);

        if package.exists().await? {
            spinner.start(&format!("Checking {} for updates...", package.name()));
            match package.update().await {
                Ok(version) => spinner.stop(&format!("{}@{}", package.name(), version)),
                Err(e) => {
                    spinner.stop_error(&format!("Update of {} failed", package.name()));
                    return Err(e);
                }
            }
        } else {
            spinner.start(&format!("Installing {}...", package.name()));
            match package.install().await {
                Ok(()) => {
                    let version = package
                        .resolved_version()
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    spinner.stop(&format!("Installed {}@{}", package.name(), version));
                }
                Err(e) => {
                    spinner.stop_error(&format!("Install of {} failed", package.name()));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn spawn(&self, entry: &std::path::Path, wire: &str) -> TrellisResult<i32> {
        let loader = loader_for(entry);
        debug!("Launching {} with {} loader", entry.display(), loader.name());

        let mut child = loader
            .command(entry, wire)
            .env(HOST_VERSION_ENV, env!("CARGO_PKG_VERSION"))
            .env(BUNDLE_PROTOCOL_ENV, BUNDLE_PROTOCOL)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| TrellisError::SpawnFailed {
                command: loader.describe(entry),
                source: e,
            })?;

        // Ctrl-C reaches the child too; wait for it to decide how to exit
        let status = wait_through_interrupts(&mut child, tokio::signal::ctrl_c)
            .await
            .map_err(|e| TrellisError::io("waiting for command process", e))?;

        let code = exit_code(status);
        info!("Command exited with code {}", code);
        Ok(code)
    }
}

/// Wait for `child`, swallowing interrupts delivered by `interrupt`.
///
/// If the interrupt source itself fails, falls back to a plain wait.
async fn wait_through_interrupts<F, Fut>(
    child: &mut Child,
    mut interrupt: F,
) -> std::io::Result<ExitStatus>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    loop {
        tokio::select! {
            status = child.wait() => return status,
            signal = interrupt() => match signal {
                Ok(()) => debug!("Interrupt received, waiting for command to exit"),
                Err(e) => {
                    warn!("Cannot listen for interrupts: {}", e);
                    return child.wait().await;
                }
            },
        }
    }
}

/// Process exit code for `code`, `None` when it does not fit in a byte.
///
/// Callers hand out-of-range codes (Windows only) to `std::process::exit`.
pub fn process_exit_code(code: i32) -> Option<ExitCode> {
    u8::try_from(code).ok().map(ExitCode::from)
}

/// Exit code of a finished child; signals map to 128 + signal number
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
