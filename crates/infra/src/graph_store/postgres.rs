//! Postgres-backed permission graph.
//!
//! Vertices and edges live in two relations (see [`super::schema`]). Shortest
//! paths are computed inside the database with a recursive path query, so a
//! single round trip answers an authorization question.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | GraphError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` |
//! | Database (foreign key violation) | `23503` | `NotFound` (edge endpoint missing) |
//! | Database (connection exception / shutdown) | `08xxx`, `57P0x` | `StorageUnavailable` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed, PoolTimedOut, Io, Tls, Protocol, WorkerCrashed | N/A | `StorageUnavailable` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Storage` |
//!
//! ## Transactions
//!
//! Every call that issues more than one statement runs in a single transaction,
//! so a failure part-way leaves nothing half-applied. Multi-statement reads
//! (`shortest_paths`, neighbour queries) run at `REPEATABLE READ` so the path
//! query and the vertex lookup share one snapshot. Multi-call engine
//! operations (e.g. adding a resource and its actions) are *not* atomic across
//! calls.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use permgraph_core::{EdgeType, GraphError, GraphResult, Vertex, VertexAttributes, VertexId};

use super::r#trait::GraphBackend;
use super::schema;

/// Postgres-backed [`GraphBackend`].
///
/// Durability and isolation are delegated to Postgres. `Send + Sync` and cheap
/// to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct PostgresGraphBackend {
    pool: Arc<PgPool>,
}

impl PostgresGraphBackend {
    /// Wrap an existing pool. The schema is assumed to exist.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `database_url` with at most `max_connections` pooled connections.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> GraphResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the enums, tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn init_schema(&self) -> GraphResult<()> {
        let mut tx = self.begin("init_schema").await?;
        for statement in schema::BOOTSTRAP {
            sqlx::raw_sql(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("init_schema", e))?;
        }
        commit(tx, "init_schema").await
    }

    async fn begin(&self, operation: &str) -> GraphResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Read-only transaction whose statements all see one snapshot.
    async fn begin_snapshot(
        &self,
        operation: &str,
    ) -> GraphResult<Transaction<'static, Postgres>> {
        let mut tx = self.begin(operation).await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(tx)
    }

    async fn neighbours(&self, id: &VertexId, sql: &str, operation: &str) -> GraphResult<Vec<Vertex>> {
        let mut tx = self.begin_snapshot(operation).await?;
        require_vertex(&mut tx, id, operation).await?;

        let rows = sqlx::query(sql)
            .bind(id.as_str())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        let vertices = rows.iter().map(vertex_from_row).collect::<GraphResult<Vec<_>>>()?;

        commit(tx, operation).await?;
        Ok(vertices)
    }
}

#[async_trait]
impl GraphBackend for PostgresGraphBackend {
    #[instrument(skip(self, vertex), fields(id = %vertex.id()), err)]
    async fn add_vertex(&self, vertex: &Vertex) -> GraphResult<()> {
        let id = vertex.id();
        sqlx::query("INSERT INTO vertices (id, vtype, attrs) VALUES ($1, $2::vtype, $3)")
            .bind(id.as_str())
            .bind(vertex.kind().as_str())
            .bind(vertex.attributes().to_json()?)
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    GraphError::already_exists(format!("vertex '{id}'"))
                } else {
                    map_sqlx_error("add_vertex", e)
                }
            })?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn remove_vertex(&self, id: &VertexId) -> GraphResult<()> {
        // Edges go with it through ON DELETE CASCADE.
        sqlx::query("DELETE FROM vertices WHERE id = $1")
            .bind(id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_vertex", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn vertex_exists(&self, id: &VertexId) -> GraphResult<bool> {
        let row = sqlx::query("SELECT 1 FROM vertices WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("vertex_exists", e))?;
        Ok(row.is_some())
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get_vertex(&self, id: &VertexId) -> GraphResult<Vertex> {
        let attrs = self.get_vertex_attributes(id).await?;
        self.vertex_factory(id, &attrs)
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get_vertex_attributes(&self, id: &VertexId) -> GraphResult<VertexAttributes> {
        let row = sqlx::query("SELECT attrs FROM vertices WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_vertex_attributes", e))?
            .ok_or_else(|| GraphError::not_found(format!("vertex '{id}'")))?;
        attributes_from_row(&row)
    }

    #[instrument(skip(self, attrs), fields(id = %id), err)]
    async fn update_vertex_attributes(
        &self,
        id: &VertexId,
        attrs: VertexAttributes,
    ) -> GraphResult<()> {
        let operation = "update_vertex_attributes";
        let mut tx = self.begin(operation).await?;

        let row = sqlx::query("SELECT attrs FROM vertices WHERE id = $1 FOR UPDATE")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?
            .ok_or_else(|| GraphError::not_found(format!("vertex '{id}'")))?;

        let mut stored = attributes_from_row(&row)?;
        stored.merge(attrs);

        sqlx::query("UPDATE vertices SET attrs = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(stored.to_json()?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        commit(tx, operation).await
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get_vertices_to(&self, id: &VertexId) -> GraphResult<Vec<Vertex>> {
        self.neighbours(
            id,
            r#"
            SELECT v.id, v.attrs
            FROM edges e
            JOIN vertices v ON v.id = e.source_id
            WHERE e.target_id = $1
            ORDER BY v.id
            "#,
            "get_vertices_to",
        )
        .await
    }

    #[instrument(skip(self), fields(id = %id), err)]
    async fn get_vertices_from(&self, id: &VertexId) -> GraphResult<Vec<Vertex>> {
        self.neighbours(
            id,
            r#"
            SELECT v.id, v.attrs
            FROM edges e
            JOIN vertices v ON v.id = e.target_id
            WHERE e.source_id = $1
            ORDER BY v.id
            "#,
            "get_vertices_from",
        )
        .await
    }

    #[instrument(skip(self), fields(etype = %etype, source = %source, target = %target), err)]
    async fn add_edge(
        &self,
        etype: EdgeType,
        source: &VertexId,
        target: &VertexId,
    ) -> GraphResult<()> {
        sqlx::query("INSERT INTO edges (source_id, target_id, etype) VALUES ($1, $2, $3::etype)")
            .bind(source.as_str())
            .bind(target.as_str())
            .bind(etype.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    GraphError::already_exists(format!("edge '{source}' -> '{target}'"))
                } else if is_foreign_key_violation(&e) {
                    GraphError::not_found(format!(
                        "edge endpoint of '{source}' -> '{target}'"
                    ))
                } else {
                    map_sqlx_error("add_edge", e)
                }
            })?;
        Ok(())
    }

    #[instrument(skip(self), fields(source = %source, target = %target), err)]
    async fn edge_exists(&self, source: &VertexId, target: &VertexId) -> GraphResult<bool> {
        let row = sqlx::query("SELECT 1 FROM edges WHERE source_id = $1 AND target_id = $2")
            .bind(source.as_str())
            .bind(target.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("edge_exists", e))?;
        Ok(row.is_some())
    }

    #[instrument(skip(self), fields(source = %source, target = %target), err)]
    async fn remove_edge(&self, source: &VertexId, target: &VertexId) -> GraphResult<()> {
        sqlx::query("DELETE FROM edges WHERE source_id = $1 AND target_id = $2")
            .bind(source.as_str())
            .bind(target.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_edge", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(source = %source, target = %target), err)]
    async fn get_edge_type(&self, source: &VertexId, target: &VertexId) -> GraphResult<EdgeType> {
        let row = sqlx::query(
            "SELECT etype::text AS etype FROM edges WHERE source_id = $1 AND target_id = $2",
        )
        .bind(source.as_str())
        .bind(target.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_edge_type", e))?
        .ok_or_else(|| GraphError::not_found(format!("edge '{source}' -> '{target}'")))?;

        let etype: String = row
            .try_get("etype")
            .map_err(|e| GraphError::storage(format!("failed to read etype: {e}")))?;
        etype.parse()
    }

    #[instrument(
        skip(self),
        fields(source = %source, target = %target, paths = tracing::field::Empty),
        err
    )]
    async fn shortest_paths(
        &self,
        source: &VertexId,
        target: &VertexId,
    ) -> GraphResult<Vec<Vec<Vertex>>> {
        let operation = "shortest_paths";
        let mut tx = self.begin_snapshot(operation).await?;
        require_vertex(&mut tx, source, operation).await?;
        require_vertex(&mut tx, target, operation).await?;

        let raw_paths: Vec<Vec<String>> = if source == target {
            vec![vec![source.as_str().to_string()]]
        } else {
            sqlx::query(schema::SHORTEST_PATHS)
                .bind(source.as_str())
                .bind(target.as_str())
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(operation, e))?
                .iter()
                .map(|row| {
                    row.try_get::<Vec<String>, _>("path")
                        .map_err(|e| GraphError::storage(format!("failed to read path: {e}")))
                })
                .collect::<GraphResult<_>>()?
        };

        let ids: Vec<String> = raw_paths
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rows = sqlx::query("SELECT id, attrs FROM vertices WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        let vertices = rows
            .iter()
            .map(|row| vertex_from_row(row).map(|v| (v.id().into_string(), v)))
            .collect::<GraphResult<HashMap<_, _>>>()?;

        commit(tx, operation).await?;

        let paths = raw_paths
            .into_iter()
            .map(|path| {
                path.into_iter()
                    .map(|id| {
                        vertices.get(&id).cloned().ok_or_else(|| {
                            GraphError::storage(format!("path vertex '{id}' vanished"))
                        })
                    })
                    .collect::<GraphResult<Vec<_>>>()
            })
            .collect::<GraphResult<Vec<_>>>()?;

        tracing::Span::current().record("paths", paths.len());
        Ok(paths)
    }
}

async fn require_vertex(
    tx: &mut Transaction<'_, Postgres>,
    id: &VertexId,
    operation: &str,
) -> GraphResult<()> {
    let row = sqlx::query("SELECT 1 FROM vertices WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error(operation, e))?;
    match row {
        Some(_) => Ok(()),
        None => Err(GraphError::not_found(format!("vertex '{id}'"))),
    }
}

async fn commit(tx: Transaction<'_, Postgres>, operation: &str) -> GraphResult<()> {
    tx.commit().await.map_err(|e| map_sqlx_error(operation, e))
}

fn attributes_from_row(row: &PgRow) -> GraphResult<VertexAttributes> {
    let attrs: serde_json::Value = row
        .try_get("attrs")
        .map_err(|e| GraphError::storage(format!("failed to read attrs: {e}")))?;
    VertexAttributes::from_json(attrs)
}

fn vertex_from_row(row: &PgRow) -> GraphResult<Vertex> {
    let id: String = row
        .try_get("id")
        .map_err(|e| GraphError::storage(format!("failed to read id: {e}")))?;
    let attrs = attributes_from_row(row)?;
    Vertex::from_parts(&VertexId::new(id), &attrs)
}

/// Map a SQLx error into a [`GraphError`], separating transient failures.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> GraphError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => GraphError::AlreadyExists(msg),
                Some("23503") => GraphError::NotFound(msg),
                Some(code) if code.starts_with("08") || code.starts_with("57P") => {
                    GraphError::StorageUnavailable(msg)
                }
                _ => GraphError::Storage(msg),
            }
        }
        sqlx::Error::RowNotFound => {
            GraphError::not_found(format!("unexpected row not found in {operation}"))
        }
        sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => {
            GraphError::storage_unavailable(format!("{operation}: {err}"))
        }
        _ => GraphError::storage(format!("sqlx error in {operation}: {err}")),
    }
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some("23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some("23503")
}
