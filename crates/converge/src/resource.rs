//! Resource definitions
//!
//! A Resource is a named unit of desired state: a module tag selecting the
//! handler, a parameter tree, dependencies on other resources by name and
//! optionally a group of nested resources spliced in at run start.

use crate::catalog::Catalog;
use crate::resolve::ResolvedResource;
use crate::value::Param;
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a lifecycle hook
///
/// Hooks are called by handlers (for example to locate an existing object
/// or to clean up after a delete). They are never evaluated by the resolver.
pub type HookFn = dyn Fn(&Catalog, &ResolvedResource) -> Result<Option<Param>> + Send + Sync;

/// Named lifecycle callbacks (`on_find`, `on_create`, `on_delete`, ...)
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: BTreeMap<String, Arc<HookFn>>,
}

impl Hooks {
    /// Register a hook, replacing any existing one with the same name
    pub fn insert<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: Fn(&Catalog, &ResolvedResource) -> Result<Option<Param>> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
    }

    /// Check if a hook is registered
    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Call a hook; a missing hook yields `Ok(None)`
    pub fn call(
        &self,
        name: &str,
        catalog: &Catalog,
        resource: &ResolvedResource,
    ) -> Result<Option<Param>> {
        match self.hooks.get(name) {
            Some(hook) => hook(catalog, resource),
            None => Ok(None),
        }
    }

    /// Registered hook names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// A desired-state resource definition
///
/// # Example
///
/// ```ignore
/// use converge::{Resource, watch};
///
/// let vpc = Resource::new("vpc").with_module("vpc").with_param("cidr", "10.0.0.0/16");
/// let subnet = Resource::new("subnet")
///     .with_module("subnet")
///     .with_param("vpc_id", watch("vpc._target.id"))
///     .depends_on("vpc");
/// ```
#[derive(Debug, Clone)]
pub struct Resource {
    /// Unique name within a run
    pub name: String,
    /// Handler family; `None` for pure grouping resources
    pub module: Option<String>,
    /// Parameter tree, possibly holding deferred leaves
    pub params: Param,
    /// Names of resources that must be applied before this one
    pub depends_on: Vec<String>,
    /// Nested definitions spliced into the run (not dependencies)
    pub includes: Vec<Resource>,
    /// Bypass the resource at apply time when truthy
    pub skip: Param,
    /// Seconds to pause after applying
    pub delay: Option<Param>,
    /// Lifecycle callbacks for handlers
    pub hooks: Hooks,
}

impl Resource {
    /// Create a resource with no module, empty params and no dependencies
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            params: Param::map(),
            depends_on: Vec::new(),
            includes: Vec::new(),
            skip: Param::Bool(false),
            delay: None,
            hooks: Hooks::default(),
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Param>) -> Self {
        self.params.insert(key, value);
        self
    }

    pub fn with_params(mut self, params: Param) -> Self {
        self.params = params;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn include(mut self, resource: Resource) -> Self {
        self.includes.push(resource);
        self
    }

    pub fn with_skip(mut self, skip: impl Into<Param>) -> Self {
        self.skip = skip.into();
        self
    }

    pub fn with_delay(mut self, delay: impl Into<Param>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    pub fn with_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&Catalog, &ResolvedResource) -> Result<Option<Param>> + Send + Sync + 'static,
    {
        self.hooks.insert(name, hook);
        self
    }

    /// Module name, treating an empty string as no module
    pub fn module_name(&self) -> Option<&str> {
        self.module.as_deref().filter(|m| !m.is_empty())
    }
}

/// Splice every resource's `includes` into one flat list
///
/// Each resource is followed by its included resources, recursively. The
/// parent keeps its `includes` list; duplicate names are left for the
/// registry to reject.
pub fn flatten(resources: Vec<Resource>) -> Vec<Resource> {
    let mut flat = Vec::with_capacity(resources.len());
    for resource in resources {
        push_flattened(resource, &mut flat);
    }
    flat
}

fn push_flattened(resource: Resource, flat: &mut Vec<Resource>) {
    let includes = resource.includes.clone();
    flat.push(resource);
    for child in includes {
        push_flattened(child, flat);
    }
}
