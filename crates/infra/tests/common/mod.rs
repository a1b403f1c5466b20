//! Shared helpers for backend integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;

use permgraph_core::{Vertex, VertexId};
use permgraph_infra::PostgresGraphBackend;

/// Connect to the database named by `DATABASE_URL`, or `None` to skip.
pub async fn postgres_backend() -> Option<PostgresGraphBackend> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping postgres backend test");
        return None;
    };
    let backend = PostgresGraphBackend::connect(&url, 2)
        .await
        .expect("failed to connect to postgres");
    backend.init_schema().await.expect("failed to bootstrap schema");
    Some(backend)
}

/// Unique suffix so tests sharing one database never collide.
pub fn namespace() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

/// Paths as id strings, sorted, so results compare as sets.
pub fn path_set(paths: &[Vec<Vertex>]) -> BTreeSet<Vec<String>> {
    paths
        .iter()
        .map(|p| p.iter().map(|v| v.id().into_string()).collect())
        .collect()
}

pub fn id_set(vertices: &[Vertex]) -> BTreeSet<VertexId> {
    vertices.iter().map(Vertex::id).collect()
}
