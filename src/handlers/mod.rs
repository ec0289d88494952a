//! Built-in local handlers
//!
//! Each handler owns one catalog bucket and one module name:
//!
//! | module    | bucket     | converges                              |
//! |-----------|------------|----------------------------------------|
//! | `file`    | `files`    | a file with given content              |
//! | `symlink` | `symlinks` | a symlink pointing at a source         |
//! | `command` | `commands` | a shell command run once per host      |

pub mod command;
pub mod file;
pub mod symlink;

use anyhow::Result;
use converge::{ApplyContext, Catalog, Ensure, HandlerRegistry, Param, ResolvedResource};

pub use command::CommandHandler;
pub use file::FileHandler;
pub use symlink::SymlinkHandler;

/// Registry with every built-in handler
pub fn builtin() -> Result<HandlerRegistry> {
    let handlers = HandlerRegistry::new()
        .with(FileHandler)?
        .with(SymlinkHandler)?
        .with(CommandHandler)?;
    Ok(handlers)
}

/// State the handler should converge toward
///
/// A reverse run tears everything down regardless of `ensure`.
pub(crate) fn desired(ctx: &ApplyContext, resource: &ResolvedResource) -> Result<Ensure> {
    if ctx.is_reverse() {
        Ok(Ensure::Absent)
    } else {
        resource.ensure()
    }
}

/// Call a lifecycle hook if the resource defines it, logging what it returned
pub(crate) fn notify(hook: &str, catalog: &Catalog, resource: &ResolvedResource) -> Result<()> {
    if let Some(value) = resource.call_hook(hook, catalog)? {
        log::debug!("{} hook {hook} returned {value}", resource.name);
    }
    Ok(())
}

/// Record object for a catalog bucket
pub(crate) fn record(resource: &ResolvedResource, state: &Param) -> serde_json::Value {
    let mut object = state.to_json();
    if let Some(map) = object.as_object_mut() {
        map.insert("name".to_string(), resource.name.clone().into());
    }
    object
}
