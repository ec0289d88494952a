//! `keel check` - validate without touching anything

use anyhow::{Result, bail};
use converge::{HandlerRegistry, Plan, Resource, flatten};

use crate::Context;
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let (path, resources) = super::load_manifest(ctx)?;
    let handlers = crate::handlers::builtin()?;

    let plan = Plan::new(&resources)?;
    let unknown = unknown_modules(&handlers, &resources);
    for (name, module) in &unknown {
        ui::error(&format!("{name}: no handler for module `{module}`"));
    }
    if !unknown.is_empty() {
        bail!(
            "{} in {} use unknown modules",
            ui::count(unknown.len(), "resource"),
            path.display()
        );
    }

    ui::success(&format!(
        "{} is valid ({})",
        path.display(),
        ui::count(plan.len(), "resource")
    ));
    Ok(())
}

/// `(resource, module)` pairs no registered handler converges
fn unknown_modules(handlers: &HandlerRegistry, resources: &[Resource]) -> Vec<(String, String)> {
    flatten(resources.to_vec())
        .into_iter()
        .filter_map(|r| {
            let module = r.module_name()?.to_string();
            (!handlers.knows(&module)).then_some((r.name, module))
        })
        .collect()
}
