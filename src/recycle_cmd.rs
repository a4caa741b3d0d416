//! `folio bin` subcommands: inspect, restore, and purge recycle-bin entries.

use anyhow::Result;

use folio_core::asset::AssetOutcome;
use folio_core::models::RecycleBinEntry;

use crate::app::App;
use crate::config::Config;

/// Print every entry, newest first.
pub async fn run_list(config: &Config) -> Result<()> {
    let app = App::open(config).await?;
    let entries = app.lifecycle.list().await?;

    if entries.is_empty() {
        println!("Recycle bin is empty.");
        return Ok(());
    }

    println!("{:<38} {:<12} {:<21} LABEL", "ID", "TYPE", "DELETED");
    for entry in &entries {
        println!(
            "{:<38} {:<12} {:<21} {}",
            entry.id,
            entry.collection_type,
            entry.deleted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            label(entry)
        );
    }
    println!();
    println!("{} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });

    Ok(())
}

pub async fn run_restore(config: &Config, id: &str) -> Result<()> {
    let app = App::open(config).await?;
    let restored = app.lifecycle.restore(id).await?;
    println!(
        "Restored {} as {}",
        restored.collection_type(),
        restored.id()
    );
    Ok(())
}

pub async fn run_purge(config: &Config, id: &str) -> Result<()> {
    let app = App::open(config).await?;
    let report = app.lifecycle.purge(id).await?;

    println!("Purged {} ({})", report.entry_id, report.collection_type);
    for asset in &report.assets {
        match &asset.outcome {
            AssetOutcome::Deleted => println!("  deleted  {}", asset.public_id),
            AssetOutcome::Failed { error } => {
                println!("  FAILED   {}: {}", asset.public_id, error.message)
            }
        }
    }
    if report.failed_assets() > 0 {
        eprintln!(
            "Warning: {} asset(s) could not be deleted and may need manual cleanup.",
            report.failed_assets()
        );
    }
    Ok(())
}

/// A human-readable name for an archived record.
fn label(entry: &RecycleBinEntry) -> String {
    ["title", "name", "email"]
        .iter()
        .find_map(|field| entry.item.get(*field).and_then(|v| v.as_str()))
        .unwrap_or("-")
        .to_string()
}
