//! Handler registry and dispatch protocol
//!
//! Resource-type handlers plug into the orchestrator through the
//! [`Handler`] trait. Preflight is offered to every handler in registration
//! order until one claims the resource; apply is dispatched directly by
//! module name. A handler must decline anything it does not recognize,
//! without side effects.

use crate::catalog::Catalog;
use crate::context::ApplyContext;
use crate::error::{Error, Result};
use crate::resolve::ResolvedResource;
use crate::types::Phase;
use crate::value::Param;
use std::collections::HashMap;

/// Answer of a handler offered a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// Not this handler's resource
    Declined,
    /// Handled; `Some` carries the resource's current state
    Claimed(Option<Param>),
}

impl Claim {
    /// Claim and report state
    pub fn reported(state: impl Into<Param>) -> Self {
        Self::Claimed(Some(state.into()))
    }

    /// Claim without reporting state
    pub fn handled() -> Self {
        Self::Claimed(None)
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

/// A resource-type handler
///
/// # Example
///
/// ```ignore
/// struct Noop;
///
/// impl Handler for Noop {
///     fn modules(&self) -> &[&str] { &["noop"] }
///
///     fn apply(&self, _ctx: &mut ApplyContext, resource: &ResolvedResource) -> anyhow::Result<Claim> {
///         if !self.handles(resource) {
///             return Ok(Claim::Declined);
///         }
///         Ok(Claim::handled())
///     }
/// }
/// ```
pub trait Handler: Send + Sync {
    /// Module names this handler converges
    fn modules(&self) -> &[&str];

    /// Whether the resource's module is one of ours
    fn handles(&self, resource: &ResolvedResource) -> bool {
        resource
            .module_name()
            .is_some_and(|m| self.modules().contains(&m))
    }

    /// Discover whether the resource already exists
    ///
    /// Runs once per resource, in forward order, before any apply. The
    /// default declines everything.
    fn preflight(&self, _catalog: &Catalog, _resource: &ResolvedResource) -> anyhow::Result<Claim> {
        Ok(Claim::Declined)
    }

    /// Converge the resource toward `params.ensure`
    ///
    /// At most one create or destroy per call, and the catalog bucket for
    /// this resource kind must match reality afterwards.
    fn apply(&self, ctx: &mut ApplyContext, resource: &ResolvedResource) -> anyhow::Result<Claim>;
}

/// Dispatch tables for preflight and apply
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn Handler>>,
    by_module: HashMap<String, usize>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for all of its modules
    ///
    /// Registration order is preflight order.
    pub fn register(&mut self, handler: impl Handler + 'static) -> Result<()> {
        let index = self.handlers.len();
        for module in handler.modules() {
            if self.by_module.contains_key(*module) {
                return Err(Error::DuplicateModule((*module).to_string()));
            }
        }
        for module in handler.modules() {
            self.by_module.insert((*module).to_string(), index);
        }
        self.handlers.push(Box::new(handler));
        Ok(())
    }

    /// Builder form of [`HandlerRegistry::register`]
    pub fn with(mut self, handler: impl Handler + 'static) -> Result<Self> {
        self.register(handler)?;
        Ok(self)
    }

    /// Check if some handler claims `module`
    pub fn knows(&self, module: &str) -> bool {
        self.by_module.contains_key(module)
    }

    /// Registered module names, sorted
    pub fn modules(&self) -> Vec<&str> {
        let mut modules: Vec<&str> = self.by_module.keys().map(String::as_str).collect();
        modules.sort_unstable();
        modules
    }

    /// Offer a resource to each handler's preflight until one claims it
    ///
    /// Nobody claiming is fine for a module some handler converges (its
    /// handler just has no discovery step) but fatal for a module nobody
    /// knows, which stops the run before any apply handler runs.
    pub fn preflight(&self, catalog: &Catalog, resource: &ResolvedResource) -> Result<Claim> {
        for handler in &self.handlers {
            let claim = handler
                .preflight(catalog, resource)
                .map_err(|cause| Error::Handler {
                    phase: Phase::Preflight,
                    resource: resource.name.clone(),
                    cause,
                })?;
            if claim.is_claimed() {
                return Ok(claim);
            }
        }

        match resource.module_name() {
            Some(module) if !self.knows(module) => Err(Error::UnmappedModule {
                resource: resource.name.clone(),
                module: module.to_string(),
            }),
            _ => Ok(Claim::Declined),
        }
    }

    /// Dispatch a resource to the apply handler for its module
    ///
    /// Resources without a module are declined. A handler that declines a
    /// resource of its own module counts as no claim.
    pub fn apply(&self, ctx: &mut ApplyContext, resource: &ResolvedResource) -> Result<Claim> {
        let Some(module) = resource.module_name() else {
            return Ok(Claim::Declined);
        };
        let unmapped = || Error::UnmappedModule {
            resource: resource.name.clone(),
            module: module.to_string(),
        };

        let handler = self
            .by_module
            .get(module)
            .and_then(|i| self.handlers.get(*i))
            .ok_or_else(unmapped)?;

        log::debug!("Dispatching {} to module {}", resource.name, module);
        let claim = handler
            .apply(ctx, resource)
            .map_err(|cause| Error::Handler {
                phase: Phase::Apply,
                resource: resource.name.clone(),
                cause,
            })?;

        if claim.is_claimed() {
            Ok(claim)
        } else {
            Err(unmapped())
        }
    }
}
