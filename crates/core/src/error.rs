//! Graph error model.

use thiserror::Error;

/// Result type used across the permission graph.
pub type GraphResult<T> = Result<T, GraphError>;

/// Permission graph error.
///
/// All variants are raised synchronously at the point of violation. Nothing in
/// the core retries; transient storage failures surface as
/// [`GraphError::StorageUnavailable`] so callers can decide on a retry policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A vertex with this id exists, or an edge already connects the ordered pair.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A vertex or edge lookup missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Edge type and endpoint kinds are incompatible, or the target action is
    /// not declared by its resource type.
    #[error("invalid edge: {0}")]
    InvalidEdge(String),

    /// A resource references a resource type that was never added.
    #[error("unregistered resource type: {0}")]
    UnregisteredResourceType(String),

    /// Malformed identifier, unknown type prefix, missing attributes or an
    /// illegal name.
    #[error("invalid vertex: {0}")]
    InvalidVertex(String),

    /// The backing store could not be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The backing store rejected the operation for a non-transient reason.
    #[error("storage error: {0}")]
    Storage(String),
}

impl GraphError {
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_edge(msg: impl Into<String>) -> Self {
        Self::InvalidEdge(msg.into())
    }

    pub fn unregistered_resource_type(name: impl Into<String>) -> Self {
        Self::UnregisteredResourceType(name.into())
    }

    pub fn invalid_vertex(msg: impl Into<String>) -> Self {
        Self::InvalidVertex(msg.into())
    }

    pub fn storage_unavailable(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}
