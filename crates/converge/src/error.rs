//! Error types for convergence runs
//!
//! Every error is fatal to the run that raised it. Nothing is retried and
//! resources converged before the failure are left as they are.

use crate::graph::GraphError;
use crate::types::Phase;
use thiserror::Error;

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown node or dependency cycle
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Two resources share a name after includes are expanded
    #[error("duplicate resource name: {0}")]
    DuplicateResource(String),

    /// A resource depends on a name that is not part of the run
    #[error("resource `{resource}` depends on unknown resource `{dependency}`")]
    UnknownDependency { resource: String, dependency: String },

    /// No handler claimed a resource that names a module
    #[error("resource `{resource}` uses module `{module}`, which no handler claims")]
    UnmappedModule { resource: String, module: String },

    /// Two handlers registered for the same module
    #[error("module `{0}` is registered by more than one handler")]
    DuplicateModule(String),

    /// A handler gave up on a resource
    #[error("{phase} of `{resource}` failed: {cause:#}")]
    Handler {
        phase: Phase,
        resource: String,
        cause: anyhow::Error,
    },
}

/// Result type for convergence operations
pub type Result<T> = std::result::Result<T, Error>;
