//! Execution planner - builds dependency graphs and resource orderings

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::registry::ResourceRegistry;
use crate::resource::{Resource, flatten};
use crate::types::Direction;
use serde::{Deserialize, Serialize};

/// Orderings for both traversal directions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Dependencies before dependants
    pub forward: Vec<String>,
    /// Dependants before dependencies
    pub reverse: Vec<String>,
}

impl Plan {
    /// Plan a list of resource definitions
    ///
    /// Includes are expanded on copies; the definitions are not consumed.
    pub fn new(resources: &[Resource]) -> Result<Self> {
        let registry = ResourceRegistry::from_resources(flatten(resources.to_vec()))?;
        Self::for_registry(&registry)
    }

    /// Plan an already populated registry
    pub fn for_registry(registry: &ResourceRegistry) -> Result<Self> {
        let (forward, reverse) = build_graphs(registry)?;
        Ok(Self {
            forward: forward.overall_order(false)?,
            reverse: reverse.overall_order(false)?,
        })
    }

    /// Ordering for the given direction
    pub fn order(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    /// Total number of resources in the plan
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Build the forward (`depends on`) and reverse graphs for a registry
///
/// Every resource becomes a node, with or without edges.
pub fn build_graphs(registry: &ResourceRegistry) -> Result<(DependencyGraph, DependencyGraph)> {
    let mut forward = DependencyGraph::new();
    let mut reverse = DependencyGraph::new();

    for resource in registry.resources() {
        forward.add_node(resource.name.as_str());
        reverse.add_node(resource.name.as_str());
    }

    for resource in registry.resources() {
        for dependency in &resource.depends_on {
            if !registry.contains(dependency) {
                return Err(Error::UnknownDependency {
                    resource: resource.name.clone(),
                    dependency: dependency.clone(),
                });
            }
            forward.add_dependency(&resource.name, dependency)?;
            reverse.add_dependency(dependency, &resource.name)?;
        }
    }

    log::debug!(
        "Built dependency graphs over {} resources",
        forward.len()
    );
    Ok((forward, reverse))
}
