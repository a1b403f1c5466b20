//! Graph walks for auditing: which paths lead where, and who may do what.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use permgraph_core::{Action, Actor, GraphResult, Resource, Vertex, VertexId, VertexKind};
use permgraph_infra::GraphBackend;

use crate::engine::PermissionGraph;

/// An authorized (actor, action) pair and the path that grants it.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionPolicy {
    pub actor: Actor,
    pub action: Action,
    pub resource: Resource,
    pub resource_type: String,
    /// First tied shortest path that ends in `ALLOW`.
    pub path: Vec<Vertex>,
}

impl<B: GraphBackend> PermissionGraph<B> {
    /// Every simple path from `source` that ends at the first vertex of
    /// `target_kind` reached along it.
    ///
    /// Walks outgoing edges, or incoming edges when `reverse` is set. A path
    /// stops at its first match and is not extended past it.
    pub async fn paths_to_targets(
        &self,
        source: impl Into<Vertex>,
        target_kind: VertexKind,
        reverse: bool,
    ) -> GraphResult<Vec<Vec<Vertex>>> {
        let backend = self.backend();
        let mut found = Vec::new();
        let mut pending = vec![vec![source.into()]];

        while let Some(path) = pending.pop() {
            let Some(head) = path.last() else { continue };
            let neighbours = if reverse {
                backend.get_vertices_to(&head.id()).await?
            } else {
                backend.get_vertices_from(&head.id()).await?
            };

            // pushed in reverse so paths come out in neighbour order
            for next in neighbours.into_iter().rev() {
                if path.contains(&next) {
                    continue;
                }
                let is_target = next.kind() == target_kind;
                let mut extended = path.clone();
                extended.push(next);
                if is_target {
                    found.push(extended);
                } else {
                    pending.push(extended);
                }
            }
        }
        Ok(found)
    }

    /// Every action `actor` is authorized to take, with the granting path.
    ///
    /// Ordered by action id.
    pub async fn describe_actor_permissions(
        &self,
        actor: &Actor,
    ) -> GraphResult<Vec<PermissionPolicy>> {
        let actor_id = actor.id();
        if !self.backend().vertex_exists(&actor_id).await? {
            return Ok(Vec::new());
        }

        let actions = self.reachable(&actor_id, VertexKind::Action, false).await?;
        let mut policies = Vec::new();
        for action in actions.values().filter_map(Vertex::as_action) {
            if let Some(policy) = self.permission_policy(actor, action).await? {
                policies.push(policy);
            }
        }
        debug!(actor = %actor_id, granted = policies.len(), "actor permissions described");
        Ok(policies)
    }

    /// Every (actor, action) pair on `resource` that is authorized.
    ///
    /// Ordered by action id, then actor id.
    pub async fn describe_resource_permissions(
        &self,
        resource: &Resource,
    ) -> GraphResult<Vec<PermissionPolicy>> {
        let resource_id = resource.id();
        if !self.backend().vertex_exists(&resource_id).await? {
            return Ok(Vec::new());
        }

        let mut actions: Vec<Action> = self
            .backend()
            .get_vertices_to(&resource_id)
            .await?
            .into_iter()
            .filter_map(|v| match v {
                Vertex::Action(a) => Some(a),
                _ => None,
            })
            .collect();
        actions.sort_by_key(Action::id);

        let mut policies = Vec::new();
        for action in &actions {
            let actors = self.reachable(&action.id(), VertexKind::Actor, true).await?;
            for actor in actors.values().filter_map(Vertex::as_actor) {
                if let Some(policy) = self.permission_policy(actor, action).await? {
                    policies.push(policy);
                }
            }
        }
        debug!(resource = %resource_id, granted = policies.len(), "resource permissions described");
        Ok(policies)
    }

    async fn permission_policy(
        &self,
        actor: &Actor,
        action: &Action,
    ) -> GraphResult<Option<PermissionPolicy>> {
        let explanation = self.explain_authorization(actor, action).await?;
        if !explanation.granted {
            return Ok(None);
        }
        let Some(path) = explanation.granting_path() else {
            return Ok(None);
        };
        Ok(Some(PermissionPolicy {
            actor: actor.clone(),
            action: action.clone(),
            resource: action.resource(),
            resource_type: action.resource_type.clone(),
            path: path.to_vec(),
        }))
    }

    /// All vertices of `kind` reachable from `start`, keyed (and so ordered)
    /// by id. Traversal continues through matches.
    async fn reachable(
        &self,
        start: &VertexId,
        kind: VertexKind,
        reverse: bool,
    ) -> GraphResult<BTreeMap<VertexId, Vertex>> {
        let backend = self.backend();
        let mut seen: HashSet<VertexId> = HashSet::from([start.clone()]);
        let mut queue = VecDeque::from([start.clone()]);
        let mut matches = BTreeMap::new();

        while let Some(id) = queue.pop_front() {
            let neighbours = if reverse {
                backend.get_vertices_to(&id).await?
            } else {
                backend.get_vertices_from(&id).await?
            };
            for next in neighbours {
                let next_id = next.id();
                if !seen.insert(next_id.clone()) {
                    continue;
                }
                queue.push_back(next_id.clone());
                if next.kind() == kind {
                    matches.insert(next_id, next);
                }
            }
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use permgraph_core::{Group, ResourceType};

    use super::*;

    async fn shared_document() -> (PermissionGraph, Resource) {
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
    async fn paths_stop_at_first_match() {
        let (graph, doc) = shared_document().await;
        let alice = Actor::new("alice");
        let admins = Group::new("admins");
        graph.add_actor(&alice).await.unwrap();
        graph.add_group(&admins).await.unwrap();
        graph.add_actor_to_group(&alice, &admins).await.unwrap();
        graph.allow(&admins, &doc.action("View")).await.unwrap();

        let paths = graph
            .paths_to_targets(&alice, VertexKind::Group, false)
            .await
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 2);
        assert_eq!(paths[0][1].id(), admins.id());

        let paths = graph
            .paths_to_targets(&alice, VertexKind::Action, false)
            .await
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].last().unwrap().id(), doc.action("View").id());
    }

    fn ids(paths: &[Vec<Vertex>]) -> Vec<Vec<String>> {
        paths
            .iter()
            .map(|p| p.iter().map(|v| v.id().into_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn paths_do_not_expand_past_first_match() {
        let graph = PermissionGraph::new();
        graph
            .add_resource_type(&ResourceType::new("Directory", ["Share"]))
            .await
            .unwrap();
        graph
            .add_resource_type(&ResourceType::new("Document", ["Share"]))
            .await
            .unwrap();
        let root = Resource::new("root", "Directory");
        let home = Resource::new("home", "Directory");
        let notes = Resource::new("notes", "Document");
        for resource in [&root, &home, &notes] {
            graph.add_resource(resource).await.unwrap();
        }
        let alice = Actor::new("alice");
        graph.add_actor(&alice).await.unwrap();

        // alice -> home.Share -> notes.Share, and root.Share -> home.Share
        graph.allow(&alice, &home.action("Share")).await.unwrap();
        graph
            .allow(&home.action("Share"), &notes.action("Share"))
            .await
            .unwrap();
        graph
            .allow(&root.action("Share"), &home.action("Share"))
            .await
            .unwrap();

        let forward = graph
            .paths_to_targets(&alice, VertexKind::Action, false)
            .await
            .unwrap();
        assert_eq!(
            ids(&forward),
            [[alice.id().into_string(), home.action("Share").id().into_string()]]
        );

        let reverse = graph
            .paths_to_targets(&notes.action("Share"), VertexKind::Action, true)
            .await
            .unwrap();
        assert_eq!(
            ids(&reverse),
            [[
                notes.action("Share").id().into_string(),
                home.action("Share").id().into_string(),
            ]]
        );
    }

    #[tokio::test]
    async fn reverse_paths_walk_incoming_edges() {
        let (graph, doc) = shared_document().await;
        let paths = graph
            .paths_to_targets(&doc, VertexKind::Action, true)
            .await
            .unwrap();
        let mut ends: Vec<String> = paths
            .iter()
            .map(|p| p.last().unwrap().name().to_string())
            .collect();
        ends.sort();
        assert_eq!(ends, ["Edit", "View"]);
    }

    #[tokio::test]
    async fn describe_skips_denied_actions() {
        let (graph, doc) = shared_document().await;
        let alice = Actor::new("alice");
        graph.add_actor(&alice).await.unwrap();
        graph.allow(&alice, &doc.action("View")).await.unwrap();
        graph.deny(&alice, &doc.action("Edit")).await.unwrap();

        let by_actor = graph.describe_actor_permissions(&alice).await.unwrap();
        assert_eq!(by_actor.len(), 1);
        assert_eq!(by_actor[0].action.name, "View");
        assert_eq!(by_actor[0].resource, doc);
        assert_eq!(by_actor[0].resource_type, "Document");
        assert_eq!(by_actor[0].path.len(), 2);

        let by_resource = graph.describe_resource_permissions(&doc).await.unwrap();
        assert_eq!(by_resource.len(), 1);
        assert_eq!(by_resource[0].actor, alice);
    }

    #[tokio::test]
    async fn describe_unknown_vertices_is_empty() {
        let (graph, _) = shared_document().await;
        assert!(graph
            .describe_actor_permissions(&Actor::new("ghost"))
            .await
            .unwrap()
            .is_empty());
        assert!(graph
            .describe_resource_permissions(&Resource::new("Missing", "Document"))
            .await
            .unwrap()
            .is_empty());
    }
}
