//! `permgraph-auth`: relationship-based authorization over a permission graph.
//!
//! Actors, groups, resources, resource types and actions are vertices;
//! membership and permission grants are edges. An actor may take an action
//! when the shortest paths between them end in `ALLOW` (see [`engine`]).
//!
//! ```no_run
//! # async fn demo() -> permgraph_core::GraphResult<()> {
//! use permgraph_auth::PermissionGraph;
//! use permgraph_core::{Actor, Group, Resource, ResourceType};
//!
//! permgraph_observability::init();
//! let graph = PermissionGraph::new();
//! graph.add_resource_type(&ResourceType::new("Document", ["View"])).await?;
//! let doc = Resource::new("MyDoc", "Document");
//! graph.add_resource(&doc).await?;
//!
//! let alice = Actor::new("Alice");
//! let admins = Group::new("Admins");
//! graph.add_actor(&alice).await?;
//! graph.add_group(&admins).await?;
//! graph.add_actor_to_group(&alice, &admins).await?;
//! graph.allow(&admins, &doc.action("View")).await?;
//!
//! assert!(graph.action_is_authorized(&alice, &doc.action("View")).await?);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod explain;

pub use audit::PermissionPolicy;
pub use config::{EngineConfig, TIE_BREAKER_VAR};
pub use engine::PermissionGraph;
pub use explain::{AuthorizationExplanation, DecisionBasis, PathVerdict};
