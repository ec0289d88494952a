//! `keel catalog` - show what the last run recorded

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use converge::Catalog;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, bucket: Option<&str>, json: bool) -> Result<()> {
    let store = super::catalog_store(ctx)?;
    let stored = store.load()?;

    if json {
        let out = match bucket {
            Some(name) => serde_json::to_string_pretty(stored.catalog.bucket(name)),
            None => serde_json::to_string_pretty(&stored.catalog),
        }
        .context("Failed to serialize catalog")?;
        println!("{out}");
        return Ok(());
    }

    ui::header("Catalog");
    ui::kv("file", &store.path().display().to_string());
    ui::kv(
        "updated",
        &stored.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    let names: Vec<&str> = match bucket {
        Some(name) => vec![name],
        None => stored.catalog.bucket_names().collect(),
    };
    if names.is_empty() {
        ui::dim("(empty)");
        return Ok(());
    }
    for name in names {
        print_bucket(&stored.catalog, name);
    }
    Ok(())
}

fn print_bucket(catalog: &Catalog, name: &str) {
    let objects = catalog.bucket(name);
    ui::section(&format!("{name} ({})", objects.len()));
    for object in objects {
        let label = object
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("?");
        println!("  {} {}", "•".dimmed(), label.bold());
        if let Some(fields) = object.as_object() {
            for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != "name") {
                ui::kv(&format!("  {key}"), &value.to_string());
            }
        }
    }
}
