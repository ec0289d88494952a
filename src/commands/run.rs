//! `keel apply` and `keel destroy`

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use converge::{Direction, Orchestrator, RunSummary};

use crate::Context;
use crate::progress::ConsoleObserver;
use crate::ui;

/// Converge the manifest in the given direction and save the catalog
pub fn run(ctx: &Context, direction: Direction, yes: bool) -> Result<()> {
    let (path, resources) = super::load_manifest(ctx)?;
    let store = super::catalog_store(ctx)?;
    let stored = store.load()?;

    if !ctx.quiet {
        ui::header(match direction {
            Direction::Forward => "Apply",
            Direction::Reverse => "Destroy",
        });
        ui::kv("manifest", &path.display().to_string());
        ui::kv("catalog", &store.path().display().to_string());
    }

    if direction.is_reverse() && !yes && !confirm_destroy()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let handlers = crate::handlers::builtin()?;
    let mut orchestrator = Orchestrator::new(&handlers);
    if !ctx.quiet {
        orchestrator = orchestrator.with_observer(ConsoleObserver::new(ctx.verbose > 0));
    }
    let mut catalog = stored.catalog;
    let result = orchestrator.run(&mut catalog, resources, direction);

    // Record what converged before a failure too
    store.save(&catalog)?;
    let report = result?;

    if !ctx.quiet {
        print_summary(&report.summary, direction);
    }
    Ok(())
}

fn confirm_destroy() -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt("Tear down every resource in the manifest?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

fn print_summary(summary: &RunSummary, direction: Direction) {
    println!();
    let verb = if direction.is_reverse() {
        "torn down"
    } else {
        "converged"
    };
    ui::success(&format!("{} {verb}", ui::count(summary.applied, "resource")));

    if summary.discovered > 0 {
        println!("    • {} already existed", summary.discovered);
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", summary.skipped);
    }
    if summary.unhandled > 0 {
        println!("    • {} grouping only", summary.unhandled);
    }
    if summary.delayed_secs > 0 {
        println!("    • {}s spent waiting", summary.delayed_secs);
    }
}
