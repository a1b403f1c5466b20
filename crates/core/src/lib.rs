//! `permgraph-core`: permission graph data model.
//!
//! Vertices (actors, groups, resource types, resources, actions), typed edges
//! and the error model. This crate is **pure**: no storage or traversal.

pub mod edge;
pub mod error;
pub mod id;
pub mod policy;
pub mod vertex;

pub use edge::EdgeType;
pub use error::{GraphError, GraphResult};
pub use id::{VertexId, VertexKind};
pub use policy::{TieBreakerPolicy, UnknownPolicy};
pub use vertex::{
    Action, Actor, Group, Resource, ResourceType, Vertex, VertexAttributes, validate_action_names,
};
