//! `keel plan`

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use converge::Plan;

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context, json: bool) -> Result<()> {
    let (_, resources) = super::load_manifest(ctx)?;
    let plan = Plan::new(&resources)?;

    if json {
        let out = serde_json::to_string_pretty(&plan).context("Failed to serialize plan")?;
        println!("{out}");
        return Ok(());
    }

    if plan.is_empty() {
        ui::info("Manifest declares no resources");
        return Ok(());
    }

    ui::section("Apply order");
    print_order(&plan.forward);
    ui::section("Destroy order");
    print_order(&plan.reverse);
    Ok(())
}

fn print_order(order: &[String]) {
    let width = order.len().to_string().len();
    for (i, name) in order.iter().enumerate() {
        println!(
            "  {} {}",
            format!("{:>width$}.", i + 1).dimmed(),
            name
        );
    }
}
