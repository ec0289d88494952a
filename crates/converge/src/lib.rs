//! # Converge
//!
//! A dependency-ordered convergence engine.
//!
//! Resources declare a desired state, the modules that converge them and
//! the other resources they depend on. The engine orders them, lets every
//! handler discover what already exists, then dispatches each resource to
//! its handler in dependency order (or the reverse, for teardown).
//!
//! ## Core Concepts
//!
//! - **Resource**: a named definition with a module, params, dependencies,
//!   nested includes, a `skip` condition and a post-apply `delay`
//! - **Param**: the configuration tree; any leaf may be a deferred value
//!   that is computed at resolution time, usually with [`watch`]
//! - **Catalog**: bucketed record of real-world objects that handlers keep
//!   consistent; passed in and handed back by every run
//! - **Handler**: converges resources of one or more modules
//! - **Orchestrator**: expands, plans, preflights and applies
//!
//! ## Example
//!
//! ```ignore
//! use converge::{
//!     apply, watch, ApplyContext, Catalog, Claim, Handler, HandlerRegistry,
//!     Param, ResolvedResource, Resource,
//! };
//!
//! struct Network;
//!
//! impl Handler for Network {
//!     fn modules(&self) -> &[&str] { &["network"] }
//!
//!     fn apply(&self, ctx: &mut ApplyContext, r: &ResolvedResource) -> anyhow::Result<Claim> {
//!         if !self.handles(r) {
//!             return Ok(Claim::Declined);
//!         }
//!         ctx.catalog.push("networks", serde_json::json!({ "name": r.name }));
//!         Ok(Claim::reported(Param::map().with("id", "net-1")))
//!     }
//! }
//!
//! let handlers = HandlerRegistry::new().with(Network)?;
//! let resources = vec![
//!     Resource::new("net").with_module("network"),
//!     Resource::new("vm")
//!         .with_module("network")
//!         .with_param("network_id", watch("net._target.id"))
//!         .depends_on("net"),
//! ];
//!
//! let catalog = apply(&handlers, Catalog::new(), resources, false)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`RunObserver`]: receives progress updates
//! - [`Sleeper`]: performs the pause requested by `delay`
//!
//! This keeps the crate free of any UI or clock dependency.

pub mod catalog;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod handler;
pub mod planner;
pub mod registry;
pub mod resolve;
pub mod resource;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use catalog::Catalog;
pub use context::{ApplyContext, NoProgress, RunObserver, Sleeper, ThreadSleeper};
pub use error::{Error, Result};
pub use executor::{Orchestrator, RunReport, apply};
pub use graph::{DependencyGraph, GraphError};
pub use handler::{Claim, Handler, HandlerRegistry};
pub use planner::Plan;
pub use registry::{ResourceRegistry, RuntimeState};
pub use resolve::{ResolvedResource, resolve};
pub use resource::{HookFn, Hooks, Resource, flatten};
pub use types::{Direction, Ensure, Outcome, Phase, RunSummary};
pub use value::{Deferred, Param, watch, watch_with};
