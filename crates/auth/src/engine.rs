//! The authorization engine façade.
//!
//! All graph mutations go through [`PermissionGraph`], which checks the data
//! model invariants before delegating to a [`GraphBackend`]. Authorization is
//! decided by the shortest paths between an actor and an action:
//!
//! 1. no path → deny
//! 2. one path → the type of its final edge (`ALLOW` permits, `DENY` denies)
//! 3. several tied paths → their final edge types combined under the
//!    configured [`TieBreakerPolicy`]

use std::collections::BTreeSet;

use tracing::{debug, warn};

use permgraph_core::{
    Action, Actor, EdgeType, GraphError, GraphResult, Group, Resource, ResourceType,
    TieBreakerPolicy, Vertex, VertexAttributes, VertexId, VertexKind, validate_action_names,
};
use permgraph_infra::{GraphBackend, InMemoryGraphBackend};

use crate::explain::{AuthorizationExplanation, DecisionBasis, PathVerdict};

/// Relationship-based permission graph.
///
/// Generic over its storage; defaults to the in-memory backend.
#[derive(Debug)]
pub struct PermissionGraph<B = InMemoryGraphBackend> {
    backend: B,
    tie_breaker_policy: TieBreakerPolicy,
}

impl PermissionGraph<InMemoryGraphBackend> {
    /// In-memory graph with the `ANY_ALLOW` tie-breaker.
    pub fn new() -> Self {
        Self::with_backend(InMemoryGraphBackend::new(), TieBreakerPolicy::default())
    }
}

impl Default for PermissionGraph<InMemoryGraphBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GraphBackend> PermissionGraph<B> {
    pub fn with_backend(backend: B, tie_breaker_policy: TieBreakerPolicy) -> Self {
        Self {
            backend,
            tie_breaker_policy,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tie_breaker_policy(&self) -> TieBreakerPolicy {
        self.tie_breaker_policy
    }

    async fn add_vertex(&self, vertex: Vertex) -> GraphResult<()> {
        vertex.validate()?;
        self.backend.add_vertex(&vertex).await?;
        debug!(vertex = %vertex, "vertex added");
        Ok(())
    }

    async fn remove_vertex(&self, id: &VertexId) -> GraphResult<()> {
        self.backend.remove_vertex(id).await?;
        debug!(vertex = %id, "vertex removed");
        Ok(())
    }

    /// Vertices of `kind` among the incoming neighbours of `id`.
    async fn members_of(&self, id: &VertexId, kind: VertexKind) -> GraphResult<Vec<Vertex>> {
        Ok(self
            .backend
            .get_vertices_to(id)
            .await?
            .into_iter()
            .filter(|v| v.kind() == kind)
            .collect())
    }

    // ── actors & groups ─────────────────────────────────────────────────────

    pub async fn add_actor(&self, actor: &Actor) -> GraphResult<()> {
        self.add_vertex(actor.into()).await
    }

    pub async fn remove_actor(&self, actor: &Actor) -> GraphResult<()> {
        self.remove_vertex(&actor.id()).await
    }

    pub async fn add_group(&self, group: &Group) -> GraphResult<()> {
        self.add_vertex(group.into()).await
    }

    pub async fn remove_group(&self, group: &Group) -> GraphResult<()> {
        self.remove_vertex(&group.id()).await
    }

    pub async fn add_actor_to_group(&self, actor: &Actor, group: &Group) -> GraphResult<()> {
        self.backend
            .add_edge(EdgeType::MemberOf, &actor.id(), &group.id())
            .await
    }

    pub async fn remove_actor_from_group(&self, actor: &Actor, group: &Group) -> GraphResult<()> {
        self.backend.remove_edge(&actor.id(), &group.id()).await
    }

    // ── resource types & resources ──────────────────────────────────────────

    pub async fn add_resource_type(&self, resource_type: &ResourceType) -> GraphResult<()> {
        self.add_vertex(resource_type.into()).await
    }

    /// Remove a resource type, every resource of that type and their actions.
    pub async fn remove_resource_type(&self, resource_type: &ResourceType) -> GraphResult<()> {
        let id = resource_type.id();
        if !self.backend.vertex_exists(&id).await? {
            return Ok(());
        }
        for resource in self.members_of(&id, VertexKind::Resource).await? {
            if let Vertex::Resource(resource) = resource {
                self.remove_resource(&resource).await?;
            }
        }
        self.remove_vertex(&id).await
    }

    /// Add a resource with one action vertex per action its type declares now.
    ///
    /// Not atomic across backend calls: a failure part-way can leave the
    /// resource without all of its actions.
    pub async fn add_resource(&self, resource: &Resource) -> GraphResult<()> {
        let vertex = Vertex::from(resource);
        vertex.validate()?;

        let resource_type = self.registered_resource_type(&resource.resource_type).await?;

        self.backend.add_vertex(&vertex).await?;
        self.backend
            .add_edge(EdgeType::MemberOf, &resource.id(), &resource_type.id())
            .await?;
        for action_name in &resource_type.actions {
            self.add_action(resource, action_name).await?;
        }
        debug!(
            resource = %vertex,
            actions = resource_type.actions.len(),
            "resource added"
        );
        Ok(())
    }

    /// Remove a resource and its actions.
    pub async fn remove_resource(&self, resource: &Resource) -> GraphResult<()> {
        let id = resource.id();
        if !self.backend.vertex_exists(&id).await? {
            return Ok(());
        }
        for action in self.members_of(&id, VertexKind::Action).await? {
            self.remove_vertex(&action.id()).await?;
        }
        self.remove_vertex(&id).await
    }

    /// Replace the action set of a resource type and bring every existing
    /// resource of that type in line.
    ///
    /// New names get an action vertex on each resource; dropped names lose
    /// theirs (with any permission edges). Actions present in both sets, and
    /// their edges, are left untouched.
    pub async fn update_resource_type_actions<I, S>(
        &self,
        type_name: &str,
        new_actions: I,
    ) -> GraphResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let new_actions: Vec<String> = new_actions.into_iter().map(Into::into).collect();
        validate_action_names(&new_actions)?;

        let resource_type = self.registered_resource_type(type_name).await?;
        let rt_id = resource_type.id();
        self.backend
            .update_vertex_attributes(
                &rt_id,
                VertexAttributes {
                    actions: Some(new_actions.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let wanted: BTreeSet<&str> = new_actions.iter().map(String::as_str).collect();
        for resource in self.members_of(&rt_id, VertexKind::Resource).await? {
            let Vertex::Resource(resource) = resource else {
                continue;
            };
            let existing: Vec<Vertex> = self.members_of(&resource.id(), VertexKind::Action).await?;
            let existing_names: BTreeSet<&str> = existing.iter().map(Vertex::name).collect();

            for action in &existing {
                if !wanted.contains(action.name()) {
                    self.remove_vertex(&action.id()).await?;
                }
            }
            for name in &new_actions {
                if !existing_names.contains(name.as_str()) {
                    self.add_action(&resource, name).await?;
                }
            }
        }
        debug!(
            resource_type = %rt_id,
            old = ?resource_type.actions,
            new = ?new_actions,
            "resource type actions updated"
        );
        Ok(())
    }

    async fn add_action(&self, resource: &Resource, name: &str) -> GraphResult<()> {
        let action = resource.action(name);
        self.backend.add_vertex(&Vertex::from(&action)).await?;
        self.backend
            .add_edge(EdgeType::MemberOf, &action.id(), &resource.id())
            .await
    }

    async fn registered_resource_type(&self, name: &str) -> GraphResult<ResourceType> {
        let id = ResourceType::new(name, Vec::<String>::new()).id();
        match self.backend.get_vertex(&id).await {
            Ok(Vertex::ResourceType(rt)) => Ok(rt),
            Ok(other) => Err(GraphError::invalid_vertex(format!(
                "'{id}' resolved to a {} vertex",
                other.kind()
            ))),
            Err(GraphError::NotFound(_)) => Err(GraphError::unregistered_resource_type(name)),
            Err(e) => Err(e),
        }
    }

    // ── permissions ─────────────────────────────────────────────────────────

    /// Grant `source` (actor, group or action) permission to take `action`.
    pub async fn allow(
        &self,
        source: impl Into<Vertex>,
        action: impl Into<Vertex>,
    ) -> GraphResult<()> {
        self.add_permission(EdgeType::Allow, source.into(), action.into())
            .await
    }

    /// Deny `source` (actor, group or action) permission to take `action`.
    pub async fn deny(
        &self,
        source: impl Into<Vertex>,
        action: impl Into<Vertex>,
    ) -> GraphResult<()> {
        self.add_permission(EdgeType::Deny, source.into(), action.into())
            .await
    }

    /// Remove an `ALLOW` or `DENY` edge. No-op if there is none.
    ///
    /// Membership edges are not permissions and cannot be revoked.
    pub async fn revoke(
        &self,
        source: impl Into<Vertex>,
        action: impl Into<Vertex>,
    ) -> GraphResult<()> {
        let (source, target) = (source.into().id(), action.into().id());
        match self.backend.get_edge_type(&source, &target).await {
            Ok(EdgeType::Allow | EdgeType::Deny) => {
                self.backend.remove_edge(&source, &target).await?;
                debug!(%source, %target, "permission revoked");
                Ok(())
            }
            Ok(EdgeType::MemberOf) => Err(GraphError::invalid_edge(format!(
                "'{source}' -> '{target}' is a membership, not a permission"
            ))),
            Err(GraphError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn add_permission(
        &self,
        etype: EdgeType,
        source: Vertex,
        target: Vertex,
    ) -> GraphResult<()> {
        if !etype.connects(source.kind(), target.kind()) {
            return Err(GraphError::invalid_edge(format!(
                "{etype} cannot connect {} '{source}' to {} '{target}'",
                source.kind(),
                target.kind()
            )));
        }
        if source == target {
            return Err(GraphError::invalid_edge(format!(
                "{etype} cannot connect '{source}' to itself"
            )));
        }
        let Vertex::Action(action) = &target else {
            return Err(GraphError::invalid_edge(format!("'{target}' is not an action")));
        };

        let declared = match self.registered_resource_type(&action.resource_type).await {
            Ok(rt) => rt.declares(&action.name),
            Err(GraphError::UnregisteredResourceType(_)) => false,
            Err(e) => return Err(e),
        };
        if !declared {
            return Err(GraphError::invalid_edge(format!(
                "action '{}' is not declared by resource type '{}'",
                action.name, action.resource_type
            )));
        }

        self.backend.add_edge(etype, &source.id(), &target.id()).await?;
        debug!(%etype, source = %source, target = %target, "permission added");
        Ok(())
    }

    // ── authorization ───────────────────────────────────────────────────────

    /// Whether `actor` may take `action`. Fail-closed: anything other than a
    /// permitting decision is `false`.
    pub async fn action_is_authorized(&self, actor: &Actor, action: &Action) -> GraphResult<bool> {
        Ok(self.explain_authorization(actor, action).await?.granted)
    }

    /// Decide whether `actor` may take `action` and report why.
    pub async fn explain_authorization(
        &self,
        actor: &Actor,
        action: &Action,
    ) -> GraphResult<AuthorizationExplanation> {
        let policy = self.tie_breaker_policy;
        let (actor_id, action_id) = (actor.id(), action.id());

        for id in [&actor_id, &action_id] {
            if !self.backend.vertex_exists(id).await? {
                debug!(actor = %actor_id, action = %action_id, missing = %id, "denied: unknown vertex");
                return Ok(AuthorizationExplanation::denied(
                    actor_id.clone(),
                    action_id.clone(),
                    policy,
                    DecisionBasis::UnknownVertex,
                    format!("'{id}' is not in the graph"),
                ));
            }
        }

        let paths = self.backend.shortest_paths(&actor_id, &action_id).await?;
        if paths.is_empty() {
            debug!(actor = %actor_id, action = %action_id, "denied: no path");
            return Ok(AuthorizationExplanation::denied(
                actor_id,
                action_id,
                policy,
                DecisionBasis::NoPath,
                "no path connects the actor to the action".to_string(),
            ));
        }

        let mut verdicts = Vec::with_capacity(paths.len());
        for path in paths {
            let terminal = self.terminal_edge(&path).await?;
            verdicts.push(PathVerdict { path, terminal });
        }

        let explanation = AuthorizationExplanation::decide(actor_id, action_id, policy, verdicts);
        debug!(
            actor = %explanation.actor,
            action = %explanation.action,
            paths = explanation.paths.len(),
            policy = %policy,
            granted = explanation.granted,
            "authorization decided"
        );
        Ok(explanation)
    }

    /// Type of the final edge of a path, which must be a permission.
    async fn terminal_edge(&self, path: &[Vertex]) -> GraphResult<EdgeType> {
        let [.., last_hop, target] = path else {
            warn!(len = path.len(), "shortest path has no edge");
            return Err(GraphError::invalid_edge("shortest path has no edge"));
        };
        let etype = self
            .backend
            .get_edge_type(&last_hop.id(), &target.id())
            .await?;
        match etype {
            EdgeType::Allow | EdgeType::Deny => Ok(etype),
            EdgeType::MemberOf => {
                warn!(source = %last_hop, target = %target, "shortest path ends in a membership edge");
                Err(GraphError::invalid_edge(format!(
                    "path to '{target}' ends in {etype} rather than a permission"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn document_graph() -> (PermissionGraph, Resource) {
        let graph = PermissionGraph::new();
        graph
            .add_resource_type(&ResourceType::new("Document", ["View", "Edit"]))
            .await
            .unwrap();
        let doc = Resource::new("MyDoc", "Document");
        graph.add_resource(&doc).await.unwrap();
        (graph, doc)
    }

    #[tokio::test]
    async fn add_resource_creates_actions_and_memberships() {
        let (graph, doc) = document_graph().await;
        let backend = graph.backend();

        assert!(backend.edge_exists(&doc.id(), &doc.resource_type_id()).await.unwrap());
        for name in ["View", "Edit"] {
            let action = doc.action(name);
            assert!(backend.vertex_exists(&action.id()).await.unwrap());
            assert_eq!(
                backend.get_edge_type(&action.id(), &doc.id()).await.unwrap(),
                EdgeType::MemberOf
            );
        }
        assert_eq!(backend.vertex_count().unwrap(), 4);
    }

    #[tokio::test]
    async fn add_resource_requires_a_registered_type() {
        let graph = PermissionGraph::new();
        let err = graph
            .add_resource(&Resource::new("MyDoc", "Document"))
            .await
            .unwrap_err();
        assert_eq!(err, GraphError::unregistered_resource_type("Document"));
        assert_eq!(graph.backend().vertex_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_vertices_are_rejected() {
        let (graph, doc) = document_graph().await;
        let alice = Actor::new("Alice");
        graph.add_actor(&alice).await.unwrap();
        assert!(matches!(graph.add_actor(&alice).await, Err(GraphError::AlreadyExists(_))));
        assert!(matches!(graph.add_resource(&doc).await, Err(GraphError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn permission_edges_are_type_checked() {
        let (graph, doc) = document_graph().await;
        let alice = Actor::new("Alice");
        graph.add_actor(&alice).await.unwrap();

        // target must be an action
        assert!(matches!(
            graph.allow(&alice, &doc).await,
            Err(GraphError::InvalidEdge(_))
        ));
        // source may not be a resource
        assert!(matches!(
            graph.allow(&doc, &doc.action("View")).await,
            Err(GraphError::InvalidEdge(_))
        ));
        // undeclared action name
        assert!(matches!(
            graph.allow(&alice, &doc.action("Delete")).await,
            Err(GraphError::InvalidEdge(_))
        ));
        // self-edge
        assert!(matches!(
            graph.allow(&doc.action("View"), &doc.action("View")).await,
            Err(GraphError::InvalidEdge(_))
        ));

        graph.allow(&alice, &doc.action("View")).await.unwrap();
        assert!(matches!(
            graph.deny(&alice, &doc.action("View")).await,
            Err(GraphError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn revoke_only_touches_permissions() {
        let (graph, doc) = document_graph().await;
        let view = doc.action("View");

        // absent edge is a no-op
        let alice = Actor::new("Alice");
        graph.add_actor(&alice).await.unwrap();
        graph.revoke(&alice, &view).await.unwrap();

        assert!(matches!(
            graph.revoke(&view, &doc).await,
            Err(GraphError::InvalidEdge(_))
        ));
        assert!(graph.backend().edge_exists(&view.id(), &doc.id()).await.unwrap());
    }

    #[tokio::test]
    async fn removing_a_resource_removes_only_its_actions() {
        let (graph, doc) = document_graph().await;
        let other = Resource::new("Other", "Document");
        graph.add_resource(&other).await.unwrap();

        graph.remove_resource(&doc).await.unwrap();
        let backend = graph.backend();
        assert!(!backend.vertex_exists(&doc.id()).await.unwrap());
        assert!(!backend.vertex_exists(&doc.action("View").id()).await.unwrap());
        assert!(backend.vertex_exists(&other.action("View").id()).await.unwrap());
        assert!(backend.vertex_exists(&other.action("Edit").id()).await.unwrap());
        assert_eq!(backend.vertex_count().unwrap(), 4);

        // absent resource is a no-op
        graph.remove_resource(&doc).await.unwrap();
    }

    #[tokio::test]
    async fn removing_a_resource_type_cascades() {
        let (graph, doc) = document_graph().await;
        let folder_type = ResourceType::new("Folder", ["Open"]);
        graph.add_resource_type(&folder_type).await.unwrap();
        let folder = Resource::new("Root", "Folder");
        graph.add_resource(&folder).await.unwrap();

        graph
            .remove_resource_type(&ResourceType::new("Document", Vec::<String>::new()))
            .await
            .unwrap();

        let backend = graph.backend();
        assert!(!backend.vertex_exists(&doc.id()).await.unwrap());
        assert!(!backend.vertex_exists(&doc.resource_type_id()).await.unwrap());
        assert!(backend.vertex_exists(&folder.action("Open").id()).await.unwrap());
        assert_eq!(backend.vertex_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn unknown_vertices_are_denied_without_error() {
        let (graph, doc) = document_graph().await;
        let ghost = Actor::new("Ghost");
        let explanation = graph
            .explain_authorization(&ghost, &doc.action("View"))
            .await
            .unwrap();
        assert!(!explanation.granted);
        assert_eq!(explanation.basis, DecisionBasis::UnknownVertex);
    }
}
