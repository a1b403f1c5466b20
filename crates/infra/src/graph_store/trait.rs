use std::sync::Arc;

use async_trait::async_trait;

use permgraph_core::{EdgeType, GraphResult, Vertex, VertexAttributes, VertexId};

/// Storage contract every permission graph backend satisfies.
///
/// The engine depends only on this trait. Backends never call back into the
/// engine and never enforce edge-type rules; they only guarantee identity and
/// edge uniqueness.
///
/// ## Uniqueness
///
/// - Vertex ids are unique: `add_vertex` fails with `AlreadyExists` for a
///   present id.
/// - At most one edge connects an ordered `(source, target)` pair, regardless
///   of its type: `add_edge` fails with `AlreadyExists` otherwise.
///
/// ## Removal
///
/// `remove_vertex` and `remove_edge` are no-op-safe when the element is absent.
/// Removing a vertex removes every edge touching it.
///
/// ## Shortest paths
///
/// `shortest_paths` returns **every** path of minimum hop count from source to
/// target, each ordered source→target inclusive. An unreachable target yields an
/// empty list. Ties are not broken here. Backends must agree on the set of
/// returned paths; their order is not significant.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Store a vertex together with its attributes.
    async fn add_vertex(&self, vertex: &Vertex) -> GraphResult<()>;

    async fn remove_vertex(&self, id: &VertexId) -> GraphResult<()>;

    async fn vertex_exists(&self, id: &VertexId) -> GraphResult<bool>;

    /// Load a vertex by id. Fails with `NotFound` if absent.
    async fn get_vertex(&self, id: &VertexId) -> GraphResult<Vertex>;

    async fn get_vertex_attributes(&self, id: &VertexId) -> GraphResult<VertexAttributes>;

    /// Merge `attrs` into the stored attributes. Fails with `NotFound` if absent.
    async fn update_vertex_attributes(
        &self,
        id: &VertexId,
        attrs: VertexAttributes,
    ) -> GraphResult<()>;

    /// One-hop incoming neighbours (sources of edges ending at `id`).
    async fn get_vertices_to(&self, id: &VertexId) -> GraphResult<Vec<Vertex>>;

    /// One-hop outgoing neighbours (targets of edges starting at `id`).
    async fn get_vertices_from(&self, id: &VertexId) -> GraphResult<Vec<Vertex>>;

    /// Fails with `AlreadyExists` if any edge connects the pair, `NotFound` if
    /// either endpoint is missing.
    async fn add_edge(&self, etype: EdgeType, source: &VertexId, target: &VertexId)
    -> GraphResult<()>;

    async fn edge_exists(&self, source: &VertexId, target: &VertexId) -> GraphResult<bool>;

    async fn remove_edge(&self, source: &VertexId, target: &VertexId) -> GraphResult<()>;

    /// Fails with `NotFound` if no edge connects the pair.
    async fn get_edge_type(&self, source: &VertexId, target: &VertexId) -> GraphResult<EdgeType>;

    /// All minimum-hop paths from `source` to `target`.
    ///
    /// Fails with `NotFound` if either endpoint is missing. A vertex reaches
    /// itself through the single path `[source]`.
    async fn shortest_paths(
        &self,
        source: &VertexId,
        target: &VertexId,
    ) -> GraphResult<Vec<Vec<Vertex>>>;

    /// Reconstruct a typed vertex from its id and stored attributes.
    fn vertex_factory(&self, id: &VertexId, attrs: &VertexAttributes) -> GraphResult<Vertex> {
        Vertex::from_parts(id, attrs)
    }
}

macro_rules! forward_graph_backend {
    ($wrapper:ident) => {
        #[async_trait]
        impl<B> GraphBackend for $wrapper<B>
        where
            B: GraphBackend + ?Sized,
        {
            async fn add_vertex(&self, vertex: &Vertex) -> GraphResult<()> {
                (**self).add_vertex(vertex).await
            }

            async fn remove_vertex(&self, id: &VertexId) -> GraphResult<()> {
                (**self).remove_vertex(id).await
            }

            async fn vertex_exists(&self, id: &VertexId) -> GraphResult<bool> {
                (**self).vertex_exists(id).await
            }

            async fn get_vertex(&self, id: &VertexId) -> GraphResult<Vertex> {
                (**self).get_vertex(id).await
            }

            async fn get_vertex_attributes(&self, id: &VertexId) -> GraphResult<VertexAttributes> {
                (**self).get_vertex_attributes(id).await
            }

            async fn update_vertex_attributes(
                &self,
                id: &VertexId,
                attrs: VertexAttributes,
            ) -> GraphResult<()> {
                (**self).update_vertex_attributes(id, attrs).await
            }

            async fn get_vertices_to(&self, id: &VertexId) -> GraphResult<Vec<Vertex>> {
                (**self).get_vertices_to(id).await
            }

            async fn get_vertices_from(&self, id: &VertexId) -> GraphResult<Vec<Vertex>> {
                (**self).get_vertices_from(id).await
            }

            async fn add_edge(
                &self,
                etype: EdgeType,
                source: &VertexId,
                target: &VertexId,
            ) -> GraphResult<()> {
                (**self).add_edge(etype, source, target).await
            }

            async fn edge_exists(&self, source: &VertexId, target: &VertexId) -> GraphResult<bool> {
                (**self).edge_exists(source, target).await
            }

            async fn remove_edge(&self, source: &VertexId, target: &VertexId) -> GraphResult<()> {
                (**self).remove_edge(source, target).await
            }

            async fn get_edge_type(
                &self,
                source: &VertexId,
                target: &VertexId,
            ) -> GraphResult<EdgeType> {
                (**self).get_edge_type(source, target).await
            }

            async fn shortest_paths(
                &self,
                source: &VertexId,
                target: &VertexId,
            ) -> GraphResult<Vec<Vec<Vertex>>> {
                (**self).shortest_paths(source, target).await
            }

            fn vertex_factory(
                &self,
                id: &VertexId,
                attrs: &VertexAttributes,
            ) -> GraphResult<Vertex> {
                (**self).vertex_factory(id, attrs)
            }
        }
    };
}

forward_graph_backend!(Arc);
forward_graph_backend!(Box);
