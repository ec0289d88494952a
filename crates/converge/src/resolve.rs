//! Resolution of deferred values
//!
//! Resolving a resource produces a [`ResolvedResource`]: a deep copy of the
//! definition in which every deferred leaf that can be evaluated right now
//! has been replaced by its value. Nothing is cached, so each call sees the
//! catalog and registry as they are at that moment. Callers that converge a
//! resource once per host resolve once per host.

use crate::catalog::Catalog;
use crate::registry::ResourceRegistry;
use crate::resource::{Hooks, Resource};
use crate::types::Ensure;
use crate::value::{Deferred, Param};
use anyhow::Result;

/// Deferred values may return further deferred values; give up after this
/// many hops and leave the leaf unresolved.
const MAX_DEFERRED_CHAIN: usize = 8;

/// A resource as seen at one point in a run
#[derive(Debug, Clone)]
pub struct ResolvedResource {
    pub name: String,
    pub module: Option<String>,
    pub params: Param,
    pub depends_on: Vec<String>,
    /// Included definitions, carried through unresolved
    pub includes: Vec<Resource>,
    pub skip: Param,
    pub delay: Option<Param>,
    pub hooks: Hooks,
    /// Target snapshot at resolution time
    pub target: Option<Param>,
    /// Host marker at resolution time
    pub current_host: Option<String>,
}

impl ResolvedResource {
    /// Module name, treating an empty string as no module
    pub fn module_name(&self) -> Option<&str> {
        self.module.as_deref().filter(|m| !m.is_empty())
    }

    /// Resolved parameter; unresolved leaves read as absent
    pub fn param(&self, key: &str) -> Option<&Param> {
        self.params.get(key)
    }

    /// Resolved string parameter
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Param::as_str)
    }

    /// String parameter that must be present
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.param_str(key).ok_or_else(|| {
            anyhow::anyhow!("resource `{}` is missing string param `{key}`", self.name)
        })
    }

    /// Desired state from `params.ensure`, defaulting to present
    pub fn ensure(&self) -> Result<Ensure> {
        Ensure::from_param(self.param("ensure"))
    }

    /// Whether the apply pass should bypass this resource
    pub fn is_skipped(&self) -> bool {
        self.skip.is_truthy()
    }

    /// Delay in seconds, if one resolved to a positive number
    pub fn delay_secs(&self) -> Option<u64> {
        self.delay
            .as_ref()
            .and_then(Param::as_u64)
            .filter(|secs| *secs > 0)
    }

    /// Call one of the resource's lifecycle hooks
    pub fn call_hook(&self, name: &str, catalog: &Catalog) -> Result<Option<Param>> {
        self.hooks.call(name, catalog, self)
    }
}

/// Resolve a resource against the current catalog and registry
///
/// The definition is not modified. Runtime state (`target`,
/// `current_host`) is read from the registry entry with the same name, so
/// a caller that wants host-specific values sets the host first.
pub fn resolve(
    resource: &Resource,
    catalog: &Catalog,
    registry: &ResourceRegistry,
) -> ResolvedResource {
    let state = registry.state(&resource.name);

    ResolvedResource {
        name: resource.name.clone(),
        module: resource.module.clone(),
        params: resolve_param(&resource.params, catalog, registry),
        depends_on: resource.depends_on.clone(),
        includes: resource.includes.clone(),
        skip: resolve_param(&resource.skip, catalog, registry),
        delay: resource
            .delay
            .as_ref()
            .map(|d| resolve_param(d, catalog, registry)),
        hooks: resource.hooks.clone(),
        target: state.and_then(|s| s.target.clone()),
        current_host: state.and_then(|s| s.current_host.clone()),
    }
}

/// Resolve every deferred leaf of a parameter tree
pub fn resolve_param(param: &Param, catalog: &Catalog, registry: &ResourceRegistry) -> Param {
    resolve_at(param, catalog, registry, 0)
}

/// `depth` counts deferred evaluations above this subtree, including those
/// whose value was a map or list holding further deferred leaves
fn resolve_at(param: &Param, catalog: &Catalog, registry: &ResourceRegistry, depth: usize) -> Param {
    match param {
        Param::Deferred(deferred) => resolve_deferred(deferred, catalog, registry, depth),
        Param::List(items) => Param::List(
            items
                .iter()
                .map(|p| resolve_at(p, catalog, registry, depth))
                .collect(),
        ),
        Param::Map(map) => Param::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_at(v, catalog, registry, depth)))
                .collect(),
        ),
        literal => literal.clone(),
    }
}

fn resolve_deferred(
    deferred: &Deferred,
    catalog: &Catalog,
    registry: &ResourceRegistry,
    depth: usize,
) -> Param {
    let mut current = deferred.clone();
    let mut hops = depth;
    while hops < MAX_DEFERRED_CHAIN {
        hops += 1;
        match current.evaluate(catalog, registry) {
            None => break,
            Some(Param::Deferred(next)) => current = next,
            Some(value) => return resolve_at(&value, catalog, registry, hops),
        }
    }
    log::trace!("Deferred value {} left unresolved", deferred.label());
    Param::Deferred(deferred.clone())
}
