//! Apply context and provider traits
//!
//! These traits let the orchestrator report progress and pause between
//! resources without depending on a particular UI or clock.

use crate::catalog::Catalog;
use crate::registry::ResourceRegistry;
use crate::resolve::{ResolvedResource, resolve};
use crate::types::{Direction, Outcome, Phase};
use anyhow::Result;
use std::time::Duration;

/// Progress callback for runs
///
/// Implement this trait to receive updates as the orchestrator walks the
/// graph.
pub trait RunObserver {
    /// Called when a pass starts
    fn on_phase_start(&mut self, phase: Phase, count: usize);

    /// Called before a resource is dispatched
    fn on_resource_start(&mut self, phase: Phase, name: &str, module: Option<&str>);

    /// Called after a resource has been handled
    fn on_resource_complete(&mut self, phase: Phase, name: &str, outcome: &Outcome);

    /// Called before pausing for a resource's delay
    fn on_delay(&mut self, name: &str, secs: u64);

    /// Called when a pass ends
    fn on_phase_complete(&mut self, phase: Phase);
}

impl<T: RunObserver + ?Sized> RunObserver for &mut T {
    fn on_phase_start(&mut self, phase: Phase, count: usize) {
        (**self).on_phase_start(phase, count);
    }
    fn on_resource_start(&mut self, phase: Phase, name: &str, module: Option<&str>) {
        (**self).on_resource_start(phase, name, module);
    }
    fn on_resource_complete(&mut self, phase: Phase, name: &str, outcome: &Outcome) {
        (**self).on_resource_complete(phase, name, outcome);
    }
    fn on_delay(&mut self, name: &str, secs: u64) {
        (**self).on_delay(name, secs);
    }
    fn on_phase_complete(&mut self, phase: Phase) {
        (**self).on_phase_complete(phase);
    }
}

/// No-op progress callback
pub struct NoProgress;

impl RunObserver for NoProgress {
    fn on_phase_start(&mut self, _phase: Phase, _count: usize) {}
    fn on_resource_start(&mut self, _phase: Phase, _name: &str, _module: Option<&str>) {}
    fn on_resource_complete(&mut self, _phase: Phase, _name: &str, _outcome: &Outcome) {}
    fn on_delay(&mut self, _name: &str, _secs: u64) {}
    fn on_phase_complete(&mut self, _phase: Phase) {}
}

/// Provider for the pause after a resource with a delay
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the current thread
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Context passed to apply handlers
///
/// Gives the handler the shared catalog and controlled access to its own
/// runtime state.
pub struct ApplyContext<'a> {
    /// Shared catalog; handlers keep their buckets consistent
    pub catalog: &'a mut Catalog,
    registry: &'a mut ResourceRegistry,
    name: &'a str,
    direction: Direction,
}

impl<'a> ApplyContext<'a> {
    /// Create a context for the named resource
    pub fn new(
        catalog: &'a mut Catalog,
        registry: &'a mut ResourceRegistry,
        name: &'a str,
        direction: Direction,
    ) -> Self {
        Self {
            catalog,
            registry,
            name,
            direction,
        }
    }

    /// Name of the resource being applied
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether this run is a teardown
    pub fn is_reverse(&self) -> bool {
        self.direction.is_reverse()
    }

    /// Read-only view of the registry
    pub fn registry(&self) -> &ResourceRegistry {
        &*self.registry
    }

    /// Mark `host` as the current host and resolve the resource again
    ///
    /// Deferred values that read `_currentHost` see the new host.
    pub fn resolve_for_host(&mut self, host: &str) -> Result<ResolvedResource> {
        self.registry
            .set_current_host(self.name, Some(host.to_string()));
        self.resolve()
    }

    /// Resolve the resource against the current catalog and registry
    pub fn resolve(&self) -> Result<ResolvedResource> {
        let resource = self
            .registry
            .get(self.name)
            .ok_or_else(|| anyhow::anyhow!("resource `{}` is not registered", self.name))?;
        Ok(resolve(resource, &*self.catalog, &*self.registry))
    }

    /// Clear the current host marker
    pub fn clear_current_host(&mut self) {
        self.registry.set_current_host(self.name, None);
    }

    /// Ask the orchestrator to pause after this resource
    pub fn set_delay(&mut self, secs: u64) {
        if let Some(state) = self.registry.state_mut(self.name) {
            state.delay = Some(secs);
        }
    }
}
