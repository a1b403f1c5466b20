use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use permgraph_core::{EdgeType, GraphError, GraphResult, Vertex, VertexAttributes, VertexId};

use super::r#trait::GraphBackend;

#[derive(Debug, Default)]
struct GraphState {
    vertices: HashMap<VertexId, VertexAttributes>,
    outgoing: HashMap<VertexId, BTreeMap<VertexId, EdgeType>>,
    incoming: HashMap<VertexId, BTreeSet<VertexId>>,
}

impl GraphState {
    fn require(&self, id: &VertexId) -> GraphResult<()> {
        if self.vertices.contains_key(id) {
            Ok(())
        } else {
            Err(GraphError::not_found(format!("vertex '{id}'")))
        }
    }

    fn materialize(&self, id: &VertexId) -> GraphResult<Vertex> {
        let attrs = self
            .vertices
            .get(id)
            .ok_or_else(|| GraphError::not_found(format!("vertex '{id}'")))?;
        Vertex::from_parts(id, attrs)
    }

    fn materialize_all<'a, I>(&self, ids: I) -> GraphResult<Vec<Vertex>>
    where
        I: IntoIterator<Item = &'a VertexId>,
    {
        ids.into_iter().map(|id| self.materialize(id)).collect()
    }

    fn edge(&self, source: &VertexId, target: &VertexId) -> Option<EdgeType> {
        self.outgoing.get(source).and_then(|targets| targets.get(target)).copied()
    }

    /// Level-synchronous BFS recording every shortest-path predecessor, then a
    /// backward walk over the predecessor DAG to enumerate the tied paths.
    fn shortest_paths(&self, source: &VertexId, target: &VertexId) -> Vec<Vec<VertexId>> {
        if source == target {
            return vec![vec![source.clone()]];
        }

        let mut depth: HashMap<&VertexId, usize> = HashMap::from([(source, 0)]);
        let mut preds: HashMap<&VertexId, Vec<&VertexId>> = HashMap::new();
        let mut frontier = vec![source];
        let mut level = 0;

        while !frontier.is_empty() && !depth.contains_key(target) {
            let mut next = Vec::new();
            for u in frontier {
                let Some(targets) = self.outgoing.get(u) else {
                    continue;
                };
                for v in targets.keys() {
                    match depth.get(v) {
                        None => {
                            depth.insert(v, level + 1);
                            preds.entry(v).or_default().push(u);
                            next.push(v);
                        }
                        Some(&d) if d == level + 1 => preds.entry(v).or_default().push(u),
                        Some(_) => {}
                    }
                }
            }
            frontier = next;
            level += 1;
        }

        if !depth.contains_key(target) {
            return Vec::new();
        }

        let mut paths = Vec::new();
        let mut stack: Vec<Vec<&VertexId>> = vec![vec![target]];
        while let Some(partial) = stack.pop() {
            let Some(&head) = partial.last() else {
                continue;
            };
            if head == source {
                paths.push(partial.iter().rev().map(|id| (*id).clone()).collect());
                continue;
            }
            for &p in preds.get(head).map(Vec::as_slice).unwrap_or_default() {
                let mut extended = partial.clone();
                extended.push(p);
                stack.push(extended);
            }
        }
        paths
    }
}

/// In-memory directed permission graph.
///
/// The default backend and the reference implementation of [`GraphBackend`].
/// Vertices are indexed by id with adjacency maps in both directions.
///
/// ## Concurrency
///
/// One `RwLock` guards the whole graph for the duration of each call: readers
/// (`vertex_exists`, `shortest_paths`, ...) run concurrently with each other,
/// writers are exclusive.
#[derive(Debug, Default)]
pub struct InMemoryGraphBackend {
    state: RwLock<GraphState>,
}

impl InMemoryGraphBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> GraphResult<usize> {
        Ok(self.read()?.vertices.len())
    }

    pub fn edge_count(&self) -> GraphResult<usize> {
        Ok(self.read()?.outgoing.values().map(BTreeMap::len).sum())
    }

    fn read(&self) -> GraphResult<RwLockReadGuard<'_, GraphState>> {
        self.state
            .read()
            .map_err(|_| GraphError::storage_unavailable("graph lock poisoned"))
    }

    fn write(&self) -> GraphResult<RwLockWriteGuard<'_, GraphState>> {
        self.state
            .write()
            .map_err(|_| GraphError::storage_unavailable("graph lock poisoned"))
    }
}

#[async_trait]
impl GraphBackend for InMemoryGraphBackend {
    async fn add_vertex(&self, vertex: &Vertex) -> GraphResult<()> {
        let id = vertex.id();
        let mut state = self.write()?;
        if state.vertices.contains_key(&id) {
            return Err(GraphError::already_exists(format!("vertex '{id}'")));
        }
        state.vertices.insert(id, vertex.attributes());
        Ok(())
    }

    async fn remove_vertex(&self, id: &VertexId) -> GraphResult<()> {
        let mut state = self.write()?;
        if state.vertices.remove(id).is_none() {
            return Ok(());
        }

        if let Some(targets) = state.outgoing.remove(id) {
            for target in targets.keys() {
                if let Some(sources) = state.incoming.get_mut(target) {
                    sources.remove(id);
                }
            }
        }
        if let Some(sources) = state.incoming.remove(id) {
            for source in &sources {
                if let Some(targets) = state.outgoing.get_mut(source) {
                    targets.remove(id);
                }
            }
        }
        Ok(())
    }

    async fn vertex_exists(&self, id: &VertexId) -> GraphResult<bool> {
        Ok(self.read()?.vertices.contains_key(id))
    }

    async fn get_vertex(&self, id: &VertexId) -> GraphResult<Vertex> {
        self.read()?.materialize(id)
    }

    async fn get_vertex_attributes(&self, id: &VertexId) -> GraphResult<VertexAttributes> {
        self.read()?
            .vertices
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::not_found(format!("vertex '{id}'")))
    }

    async fn update_vertex_attributes(
        &self,
        id: &VertexId,
        attrs: VertexAttributes,
    ) -> GraphResult<()> {
        let mut state = self.write()?;
        let stored = state
            .vertices
            .get_mut(id)
            .ok_or_else(|| GraphError::not_found(format!("vertex '{id}'")))?;
        stored.merge(attrs);
        Ok(())
    }

    async fn get_vertices_to(&self, id: &VertexId) -> GraphResult<Vec<Vertex>> {
        let state = self.read()?;
        state.require(id)?;
        match state.incoming.get(id) {
            Some(sources) => state.materialize_all(sources),
            None => Ok(Vec::new()),
        }
    }

    async fn get_vertices_from(&self, id: &VertexId) -> GraphResult<Vec<Vertex>> {
        let state = self.read()?;
        state.require(id)?;
        match state.outgoing.get(id) {
            Some(targets) => state.materialize_all(targets.keys()),
            None => Ok(Vec::new()),
        }
    }

    async fn add_edge(
        &self,
        etype: EdgeType,
        source: &VertexId,
        target: &VertexId,
    ) -> GraphResult<()> {
        let mut state = self.write()?;
        state.require(source)?;
        state.require(target)?;
        if state.edge(source, target).is_some() {
            return Err(GraphError::already_exists(format!(
                "edge '{source}' -> '{target}'"
            )));
        }
        state
            .outgoing
            .entry(source.clone())
            .or_default()
            .insert(target.clone(), etype);
        state
            .incoming
            .entry(target.clone())
            .or_default()
            .insert(source.clone());
        Ok(())
    }

    async fn edge_exists(&self, source: &VertexId, target: &VertexId) -> GraphResult<bool> {
        Ok(self.read()?.edge(source, target).is_some())
    }

    async fn remove_edge(&self, source: &VertexId, target: &VertexId) -> GraphResult<()> {
        let mut state = self.write()?;
        if let Some(targets) = state.outgoing.get_mut(source) {
            targets.remove(target);
        }
        if let Some(sources) = state.incoming.get_mut(target) {
            sources.remove(source);
        }
        Ok(())
    }

    async fn get_edge_type(&self, source: &VertexId, target: &VertexId) -> GraphResult<EdgeType> {
        self.read()?
            .edge(source, target)
            .ok_or_else(|| GraphError::not_found(format!("edge '{source}' -> '{target}'")))
    }

    async fn shortest_paths(
        &self,
        source: &VertexId,
        target: &VertexId,
    ) -> GraphResult<Vec<Vec<Vertex>>> {
        let state = self.read()?;
        state.require(source)?;
        state.require(target)?;
        state
            .shortest_paths(source, target)
            .iter()
            .map(|path| state.materialize_all(path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permgraph_core::{Actor, Group};

    fn ids(paths: &[Vec<Vertex>]) -> Vec<Vec<String>> {
        let mut out: Vec<Vec<String>> = paths
            .iter()
            .map(|p| p.iter().map(|v| v.id().into_string()).collect())
            .collect();
        out.sort();
        out
    }

    async fn diamond() -> (InMemoryGraphBackend, Vec<VertexId>) {
        // a -> b -> d, a -> c -> d, a -> e -> f -> d
        let backend = InMemoryGraphBackend::new();
        let mut out = Vec::new();
        for name in ["a", "b", "c", "d", "e", "f"] {
            let v: Vertex = Actor::new(name).into();
            backend.add_vertex(&v).await.unwrap();
            out.push(v.id());
        }
        for (s, t) in [(0, 1), (0, 2), (1, 3), (2, 3), (0, 4), (4, 5), (5, 3)] {
            backend.add_edge(EdgeType::Allow, &out[s], &out[t]).await.unwrap();
        }
        (backend, out)
    }

    #[tokio::test]
    async fn returns_every_tied_shortest_path() {
        let (backend, v) = diamond().await;
        let paths = backend.shortest_paths(&v[0], &v[3]).await.unwrap();
        assert_eq!(
            ids(&paths),
            vec![
                vec!["actor:a", "actor:b", "actor:d"],
                vec!["actor:a", "actor:c", "actor:d"],
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_target_yields_no_paths() {
        let (backend, v) = diamond().await;
        assert!(backend.shortest_paths(&v[3], &v[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cycles_do_not_break_enumeration() {
        let (backend, v) = diamond().await;
        backend.add_edge(EdgeType::Allow, &v[3], &v[0]).await.unwrap();
        let paths = backend.shortest_paths(&v[1], &v[2]).await.unwrap();
        assert_eq!(
            ids(&paths),
            vec![vec!["actor:b", "actor:d", "actor:a", "actor:c"]]
        );
    }

    #[tokio::test]
    async fn self_path_and_missing_endpoints() {
        let (backend, v) = diamond().await;
        let paths = backend.shortest_paths(&v[0], &v[0]).await.unwrap();
        assert_eq!(ids(&paths), vec![vec!["actor:a"]]);

        let ghost = Actor::new("ghost").id();
        assert!(matches!(
            backend.shortest_paths(&v[0], &ghost).await,
            Err(GraphError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn removing_a_vertex_drops_its_edges() {
        let (backend, v) = diamond().await;
        assert_eq!(backend.edge_count().unwrap(), 7);
        backend.remove_vertex(&v[3]).await.unwrap();
        assert_eq!(backend.edge_count().unwrap(), 4);
        assert!(!backend.edge_exists(&v[1], &v[3]).await.unwrap());
        assert!(backend.get_vertices_from(&v[1]).await.unwrap().is_empty());

        // absent vertex is a no-op
        backend.remove_vertex(&v[3]).await.unwrap();
        assert_eq!(backend.vertex_count().unwrap(), 5);
    }

    #[tokio::test]
    async fn neighbours_in_both_directions() {
        let backend = InMemoryGraphBackend::new();
        let alice: Vertex = Actor::new("Alice").into();
        let admins: Vertex = Group::new("Admins").into();
        backend.add_vertex(&alice).await.unwrap();
        backend.add_vertex(&admins).await.unwrap();
        backend
            .add_edge(EdgeType::MemberOf, &alice.id(), &admins.id())
            .await
            .unwrap();

        assert_eq!(backend.get_vertices_to(&admins.id()).await.unwrap(), vec![alice.clone()]);
        assert_eq!(backend.get_vertices_from(&alice.id()).await.unwrap(), vec![admins.clone()]);
        assert!(backend.get_vertices_to(&alice.id()).await.unwrap().is_empty());
    }
}
