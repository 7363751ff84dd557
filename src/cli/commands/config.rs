//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::TrellisResult;

/// Execute the config command
pub fn execute(args: ConfigArgs, config: &Config, manager: &ConfigManager) -> TrellisResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => println!("{}", render(config)?),
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
    }
    Ok(())
}

fn render(config: &Config) -> TrellisResult<String> {
    Ok(toml::to_string_pretty(config)?)
}
