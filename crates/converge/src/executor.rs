//! Orchestrator - preflight and apply passes over the dependency order

use crate::catalog::Catalog;
use crate::context::{ApplyContext, NoProgress, RunObserver, Sleeper, ThreadSleeper};
use crate::error::{Error, Result};
use crate::graph::GraphError;
use crate::handler::{Claim, HandlerRegistry};
use crate::planner::Plan;
use crate::registry::{ResourceRegistry, RuntimeState};
use crate::resolve::{ResolvedResource, resolve};
use crate::resource::{Resource, flatten};
use crate::types::{Direction, Outcome, Phase, RunSummary};
use std::collections::BTreeMap;
use std::time::Duration;

/// Everything a run produced besides the catalog
#[derive(Debug)]
pub struct RunReport {
    /// Counts per outcome
    pub summary: RunSummary,
    /// Orderings used for the run
    pub plan: Plan,
    /// Final runtime state per resource
    pub states: BTreeMap<String, RuntimeState>,
}

/// Drives a run: expand, plan, preflight, apply
///
/// # Type Parameters
/// * `'h` - lifetime of the handler registry and injected providers
pub struct Orchestrator<'h> {
    handlers: &'h HandlerRegistry,
    observer: Box<dyn RunObserver + 'h>,
    sleeper: Box<dyn Sleeper + 'h>,
}

impl<'h> Orchestrator<'h> {
    /// Create an orchestrator with no progress output and real sleeps
    pub fn new(handlers: &'h HandlerRegistry) -> Self {
        Self {
            handlers,
            observer: Box::new(NoProgress),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_observer(mut self, observer: impl RunObserver + 'h) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'h) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Converge `resources` and return the mutated catalog
    pub fn apply(
        &mut self,
        mut catalog: Catalog,
        resources: Vec<Resource>,
        direction: Direction,
    ) -> Result<Catalog> {
        self.run(&mut catalog, resources, direction)?;
        Ok(catalog)
    }

    /// Converge `resources` against `catalog`, returning run details
    ///
    /// Any error aborts the run at the point it occurs. Resources handled
    /// before that point are not rolled back, and whatever their handlers
    /// recorded stays in `catalog`.
    pub fn run(
        &mut self,
        catalog: &mut Catalog,
        resources: Vec<Resource>,
        direction: Direction,
    ) -> Result<RunReport> {
        let mut registry = ResourceRegistry::from_resources(flatten(resources))?;
        let plan = Plan::for_registry(&registry)?;
        log::info!(
            "Planned {} resources ({:?} run)",
            plan.len(),
            direction
        );

        let mut summary = RunSummary::default();
        self.preflight_pass(&plan.forward, catalog, &mut registry, &mut summary)?;
        self.apply_pass(
            plan.order(direction),
            direction,
            catalog,
            &mut registry,
            &mut summary,
        )?;

        log::info!(
            "Run complete: {} applied, {} skipped, {} without handler",
            summary.applied,
            summary.skipped,
            summary.unhandled
        );
        Ok(RunReport {
            summary,
            plan,
            states: registry.into_states(),
        })
    }

    /// Discover existing state, always in forward order
    fn preflight_pass(
        &mut self,
        order: &[String],
        catalog: &mut Catalog,
        registry: &mut ResourceRegistry,
        summary: &mut RunSummary,
    ) -> Result<()> {
        log::info!("Preflight: {} resources", order.len());
        self.observer.on_phase_start(Phase::Preflight, order.len());

        for name in order {
            let resolved = resolve_named(name, catalog, registry)?;
            self.observer
                .on_resource_start(Phase::Preflight, name, resolved.module_name());

            let claim = self.handlers.preflight(catalog, &resolved)?;
            let outcome = record_claim(registry, name, claim);

            // Later preflights and deferred values see the resolved params
            if let Some(state) = registry.state_mut(name) {
                state.preflight_params = Some(resolved.params);
            }

            log::debug!("Preflight {name}: {outcome:?}");
            summary.add(Phase::Preflight, &outcome);
            self.observer
                .on_resource_complete(Phase::Preflight, name, &outcome);
        }

        self.observer.on_phase_complete(Phase::Preflight);
        Ok(())
    }

    /// Converge each resource in the given order
    fn apply_pass(
        &mut self,
        order: &[String],
        direction: Direction,
        catalog: &mut Catalog,
        registry: &mut ResourceRegistry,
        summary: &mut RunSummary,
    ) -> Result<()> {
        log::info!("Apply ({direction:?}): {} resources", order.len());
        self.observer.on_phase_start(Phase::Apply, order.len());

        for name in order {
            let resolved = resolve_named(name, catalog, registry)?;
            self.observer
                .on_resource_start(Phase::Apply, name, resolved.module_name());

            if resolved.is_skipped() {
                log::info!("Skipping {name}");
                summary.add(Phase::Apply, &Outcome::Skipped);
                self.observer
                    .on_resource_complete(Phase::Apply, name, &Outcome::Skipped);
                continue;
            }

            let claim = {
                let mut ctx = ApplyContext::new(catalog, registry, name, direction);
                self.handlers.apply(&mut ctx, &resolved)?
            };
            let outcome = record_claim(registry, name, claim);
            summary.add(Phase::Apply, &outcome);
            self.observer
                .on_resource_complete(Phase::Apply, name, &outcome);

            let delay = registry
                .state(name)
                .and_then(|s| s.delay)
                .or_else(|| resolved.delay_secs())
                .filter(|secs| *secs > 0);
            if let Some(secs) = delay {
                log::info!("Waiting {secs}s after {name}");
                self.observer.on_delay(name, secs);
                self.sleeper.sleep(Duration::from_secs(secs));
                summary.delayed_secs += secs;
            }
        }

        self.observer.on_phase_complete(Phase::Apply);
        Ok(())
    }
}

fn resolve_named(
    name: &str,
    catalog: &Catalog,
    registry: &ResourceRegistry,
) -> Result<ResolvedResource> {
    let resource = registry
        .get(name)
        .ok_or_else(|| Error::Graph(GraphError::UnknownNode(name.to_string())))?;
    Ok(resolve(resource, catalog, registry))
}

/// Store reported state and classify the claim
fn record_claim(registry: &mut ResourceRegistry, name: &str, claim: Claim) -> Outcome {
    match claim {
        Claim::Claimed(Some(state)) => {
            registry.set_target(name, state);
            Outcome::Reported
        }
        Claim::Claimed(None) => Outcome::Claimed,
        Claim::Declined => Outcome::Unhandled,
    }
}

/// Converge `resources` with default providers
///
/// For callers that only need the resulting catalog.
pub fn apply(
    handlers: &HandlerRegistry,
    catalog: Catalog,
    resources: Vec<Resource>,
    reverse: bool,
) -> Result<Catalog> {
    Orchestrator::new(handlers).apply(catalog, resources, Direction::from_reverse(reverse))
}
