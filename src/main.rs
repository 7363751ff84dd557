//! Trellis - project scaffolding from versioned command packages
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use semver::Version;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use trellis::cli::{Cli, Commands};
use trellis::config::{Config, ConfigManager};
use trellis::error::TrellisResult;
use trellis::exec::{process_exit_code, CommandRegistry, DispatchSettings, Dispatcher};
use trellis::package::NpmInstaller;
use trellis::registry::{self, NpmRegistry, Registry};
use trellis::ui::{self, UiContext};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => exit_with(code),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            exit_with(e.exit_code())
        }
    }
}

/// Codes that do not fit `ExitCode` (Windows only) go through `process::exit`
fn exit_with(code: i32) -> ExitCode {
    process_exit_code(code).unwrap_or_else(|| std::process::exit(code))
}

async fn run() -> TrellisResult<i32> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions { shell } = cli.command {
        trellis::cli::commands::completions(shell);
        return Ok(0);
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Using config {}", config_manager.path().display());

    let home = ConfigManager::home_dir(cli.home.as_deref().or(config.cache.home.as_deref()))?;
    let mut settings = DispatchSettings::new(home).with_target_path(cli.target_path.clone());
    settings.cache_dir_name = config.cache.dir_name.clone();

    let registry_url = cli.registry.clone().unwrap_or_else(|| config.registry.url.clone());
    debug!("Registry: {}", registry_url);
    let registry: Arc<dyn Registry> = Arc::new(NpmRegistry::new(
        registry_url.clone(),
        Duration::from_secs(config.registry.timeout_secs),
    ));

    match cli.command {
        Commands::Completions { .. } => unreachable!("Completions handled above"),
        Commands::Config(args) => {
            trellis::cli::commands::config(args, &config, &config_manager)?;
            Ok(0)
        }
        Commands::Cache(args) => {
            trellis::cli::commands::cache(args, &settings).await?;
            Ok(0)
        }
        Commands::Init(args) => {
            let ui = UiContext::detect().with_quiet(cli.quiet);
            let dispatcher =
                build_dispatcher(&config, &registry_url, registry.clone(), settings, ui.clone());
            dispatcher.package_for("init")?;
            if !cli.no_update_check && config.general.check_updates {
                check_for_update(registry.as_ref(), &config.general.self_package, &ui).await;
            }
            trellis::cli::commands::init(args, &dispatcher).await
        }
        Commands::External(args) => {
            let ui = UiContext::detect().with_quiet(cli.quiet);
            let dispatcher =
                build_dispatcher(&config, &registry_url, registry.clone(), settings, ui.clone());
            // Unknown names fail before the update check touches the network
            if let Some(name) = args.first() {
                dispatcher.package_for(name)?;
            }
            if !cli.no_update_check && config.general.check_updates {
                check_for_update(registry.as_ref(), &config.general.self_package, &ui).await;
            }
            trellis::cli::commands::external(args, &dispatcher).await
        }
    }
}

fn init_logging(verbose: u8, log_format: &str) {
    // 0 = warn (spinners only), 1 = info, 2+ = debug; RUST_LOG wins when set
    let default = match verbose {
        0 => "trellis=warn",
        1 => "trellis=info",
        _ => "trellis=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

fn build_dispatcher(
    config: &Config,
    registry_url: &str,
    registry: Arc<dyn Registry>,
    settings: DispatchSettings,
    ui: UiContext,
) -> Dispatcher {
    let installer = Arc::new(
        NpmInstaller::new(config.installer.program.clone(), registry_url)
            .with_extra_args(config.installer.extra_args.clone()),
    );
    let commands = CommandRegistry::builtin().with_overrides(&config.commands);

    Dispatcher::new(settings, commands, registry, installer).with_ui(ui)
}

/// Warn when a newer trellis is published; failures only show in debug logs
async fn check_for_update(registry: &dyn Registry, package: &str, ui: &UiContext) {
    let Ok(current) = Version::parse(env!("CARGO_PKG_VERSION")) else {
        return;
    };

    match registry::newest_version_above(registry, package, &current).await {
        Ok(Some(newer)) => ui::step_warn_hint(
            ui,
            &format!("trellis {} is available (installed {})", newer, current),
            &format!("Run: npm install -g {}", package),
        ),
        Ok(None) => debug!("trellis {} is up to date", current),
        Err(e) => debug!("Update check failed: {}", e),
    }
}
