//! Resource registry and per-resource runtime state
//!
//! The registry owns the flattened definitions of one run, keyed by name,
//! plus an arena of [`RuntimeState`] records. Definitions never change
//! during a run; everything the preflight and apply passes learn goes into
//! the runtime state, where deferred values can read it.

use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::value::Param;
use std::collections::{BTreeMap, HashMap};

/// What the run has learned about one resource so far
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeState {
    /// Snapshot of the real-world object, written by preflight and apply
    pub target: Option<Param>,
    /// Host currently being converged when a handler fans out
    pub current_host: Option<String>,
    /// Params as resolved during preflight
    pub preflight_params: Option<Param>,
    /// Delay requested by the handler at run time
    pub delay: Option<u64>,
}

/// Name-indexed resources of a single run
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    order: Vec<String>,
    resources: HashMap<String, Resource>,
    states: HashMap<String, RuntimeState>,
}

impl ResourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from an already flattened list
    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Result<Self> {
        let mut registry = Self::new();
        for resource in resources {
            registry.insert(resource)?;
        }
        Ok(registry)
    }

    /// Add a resource; names must be unique
    pub fn insert(&mut self, resource: Resource) -> Result<()> {
        if self.resources.contains_key(&resource.name) {
            return Err(Error::DuplicateResource(resource.name));
        }
        self.order.push(resource.name.clone());
        self.states
            .insert(resource.name.clone(), RuntimeState::default());
        self.resources.insert(resource.name.clone(), resource);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.order.iter().filter_map(|n| self.resources.get(n))
    }

    pub fn state(&self, name: &str) -> Option<&RuntimeState> {
        self.states.get(name)
    }

    pub fn state_mut(&mut self, name: &str) -> Option<&mut RuntimeState> {
        self.states.get_mut(name)
    }

    /// Current target snapshot of a resource
    pub fn target(&self, name: &str) -> Option<&Param> {
        self.states.get(name).and_then(|s| s.target.as_ref())
    }

    pub fn set_target(&mut self, name: &str, target: Param) {
        if let Some(state) = self.states.get_mut(name) {
            state.target = Some(target);
        }
    }

    pub fn set_current_host(&mut self, name: &str, host: Option<String>) {
        if let Some(state) = self.states.get_mut(name) {
            state.current_host = host;
        }
    }

    /// Read a value by dotted path, as used by `watch`
    ///
    /// `name` alone returns a map view of the resource. Unknown resources,
    /// unknown fields, missing keys and unresolved leaves all yield `None`.
    pub fn lookup(&self, path: &str) -> Option<Param> {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        let name = segments.next()?;
        let resource = self.resources.get(name)?;
        let state = self.states.get(name)?;

        let Some(field) = segments.next() else {
            return Some(self.view(resource, state));
        };
        let rest: Vec<&str> = segments.collect();

        let found = match field {
            "params" => state
                .preflight_params
                .as_ref()
                .unwrap_or(&resource.params)
                .at_path(&rest)?
                .clone(),
            "_target" | "target" => state.target.as_ref()?.at_path(&rest)?.clone(),
            "_currentHost" | "current_host" if rest.is_empty() => {
                Param::String(state.current_host.clone()?)
            }
            "name" if rest.is_empty() => Param::String(resource.name.clone()),
            "module" if rest.is_empty() => Param::String(resource.module_name()?.to_string()),
            _ => return None,
        };

        if found.is_unresolved() {
            None
        } else {
            Some(found)
        }
    }

    fn view(&self, resource: &Resource, state: &RuntimeState) -> Param {
        let mut view = Param::map()
            .with("name", resource.name.as_str())
            .with(
                "params",
                state
                    .preflight_params
                    .clone()
                    .unwrap_or_else(|| resource.params.clone()),
            );
        if let Some(module) = resource.module_name() {
            view.insert("module", module);
        }
        if let Some(target) = &state.target {
            view.insert("_target", target.clone());
        }
        if let Some(host) = &state.current_host {
            view.insert("_currentHost", host.as_str());
        }
        view
    }

    /// Consume the registry, keeping only the runtime state
    pub fn into_states(self) -> BTreeMap<String, RuntimeState> {
        self.states.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::from_resources(vec![
            Resource::new("vpc")
                .with_module("vpc")
                .with_param("cidr", "10.0.0.0/16"),
            Resource::new("web").with_module("instance").depends_on("vpc"),
        ])
        .unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = ResourceRegistry::from_resources(vec![Resource::new("a"), Resource::new("a")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(name) if name == "a"));
    }

    #[test]
    fn test_declaration_order() {
        let names: Vec<_> = registry().resources().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["vpc", "web"]);
    }

    #[test]
    fn test_lookup_fields() {
        let mut reg = registry();
        assert_eq!(reg.lookup("vpc.params.cidr"), Some(Param::from("10.0.0.0/16")));
        assert_eq!(reg.lookup("vpc.name"), Some(Param::from("vpc")));
        assert_eq!(reg.lookup("vpc.module"), Some(Param::from("vpc")));
        assert_eq!(reg.lookup("vpc._target.id"), None);
        assert_eq!(reg.lookup("nope.params"), None);
        assert_eq!(reg.lookup("vpc.bogus"), None);

        reg.set_target("vpc", Param::from(json!({"id": "vpc-123", "subnets": ["s-1"]})));
        assert_eq!(reg.lookup("vpc._target.id"), Some(Param::from("vpc-123")));
        assert_eq!(reg.lookup("vpc.target.subnets.0"), Some(Param::from("s-1")));

        reg.set_current_host("web", Some("10.0.0.5".into()));
        assert_eq!(reg.lookup("web._currentHost"), Some(Param::from("10.0.0.5")));
    }

    #[test]
    fn test_lookup_prefers_preflight_params() {
        let mut reg = registry();
        reg.state_mut("vpc").unwrap().preflight_params =
            Some(Param::map().with("cidr", "10.1.0.0/16"));
        assert_eq!(reg.lookup("vpc.params.cidr"), Some(Param::from("10.1.0.0/16")));
    }

    #[test]
    fn test_lookup_whole_resource() {
        let mut reg = registry();
        reg.set_target("vpc", Param::from(json!({"id": "vpc-1"})));
        let view = reg.lookup("vpc").unwrap();
        assert_eq!(
            view.to_json(),
            json!({
                "name": "vpc",
                "module": "vpc",
                "params": {"cidr": "10.0.0.0/16"},
                "_target": {"id": "vpc-1"},
            })
        );
    }

    #[test]
    fn test_lookup_unresolved_leaf_is_absent() {
        let reg = ResourceRegistry::from_resources(vec![
            Resource::new("a").with_param("later", Param::deferred("later", |_, _| None)),
        ])
        .unwrap();
        assert_eq!(reg.lookup("a.params.later"), None);
    }
}
