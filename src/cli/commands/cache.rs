//! Cache command - inspect the module cache

use crate::cli::args::{CacheAction, CacheArgs};
use crate::error::TrellisResult;
use crate::exec::DispatchSettings;
use crate::package::{list_entries, CacheEntry};
use crate::ui::{self, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, settings: &DispatchSettings) -> TrellisResult<()> {
    match args.action {
        CacheAction::List { json } => list_cache(settings, json).await,
        CacheAction::Path => {
            println!("{}", settings.store_dir().display());
            Ok(())
        }
    }
}

async fn list_cache(settings: &DispatchSettings, json: bool) -> TrellisResult<()> {
    let entries = list_entries(&settings.store_dir()).await?;

    if json {
        println!("{}", render_json(&entries)?);
        return Ok(());
    }

    let ctx = UiContext::detect();
    if entries.is_empty() {
        ui::remark(&ctx, "No command packages installed.");
        return Ok(());
    }

    println!("{:<36} {:<12} {}", "PACKAGE", "VERSION", "PATH");
    for entry in &entries {
        println!(
            "{:<36} {:<12} {}",
            entry.name,
            entry.version,
            style(entry.path.display()).dim()
        );
    }
    println!();
    println!("Total: {} package version(s)", entries.len());
    Ok(())
}

fn render_json(entries: &[CacheEntry]) -> TrellisResult<String> {
    #[derive(serde::Serialize)]
    struct EntryJson<'a> {
        name: &'a str,
        version: String,
        path: String,
    }

    let rows: Vec<EntryJson> = entries
        .iter()
        .map(|e| EntryJson {
            name: &e.name,
            version: e.version.to_string(),
            path: e.path.display().to_string(),
        })
        .collect();

    Ok(serde_json::to_string_pretty(&rows)?)
}
