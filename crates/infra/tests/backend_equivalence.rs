//! In-memory and Postgres backends agree on the same mutation history.
//!
//! Skipped unless `DATABASE_URL` points at a Postgres database.

mod common;

use permgraph_core::{Action, Actor, EdgeType, GraphError, Group, Resource, ResourceType, Vertex};
use permgraph_infra::{GraphBackend, InMemoryGraphBackend};

use common::{id_set, namespace, path_set, postgres_backend};

enum Op {
    AddVertex(Vertex),
    AddEdge(EdgeType, Vertex, Vertex),
    RemoveEdge(Vertex, Vertex),
    RemoveVertex(Vertex),
}

struct Fixture {
    ops: Vec<Op>,
    vertices: Vec<Vertex>,
}

/// Groups fan out into two layers of chained actions with several tied routes,
/// a cycle, and removals part-way through.
fn fixture(ns: &str) -> Fixture {
    let rt = format!("Folder{ns}");
    let folder_type = ResourceType::new(rt.clone(), ["Share", "View"]);
    let parent = Resource::new("parent", rt.clone());
    let child = Resource::new("child", rt.clone());
    let share_parent = Action::new("Share", rt.clone(), "parent");
    let share_child = Action::new("Share", rt.clone(), "child");
    let view_child = Action::new("View", rt.clone(), "child");

    let alice: Vertex = Actor::new(format!("alice-{ns}")).into();
    let bob: Vertex = Actor::new(format!("bob-{ns}")).into();
    let admins: Vertex = Group::new(format!("admins-{ns}")).into();
    let public: Vertex = Group::new(format!("public-{ns}")).into();
    let editors: Vertex = Group::new(format!("editors-{ns}")).into();

    let vertices: Vec<Vertex> = vec![
        folder_type.into(),
        parent.into(),
        child.into(),
        share_parent.into(),
        share_child.into(),
        view_child.into(),
        alice,
        bob,
        admins,
        public,
        editors,
    ];
    let v = |i: usize| vertices[i].clone();

    let mut ops: Vec<Op> = vertices.iter().cloned().map(Op::AddVertex).collect();
    ops.extend([
        Op::AddEdge(EdgeType::MemberOf, v(1), v(0)),
        Op::AddEdge(EdgeType::MemberOf, v(2), v(0)),
        Op::AddEdge(EdgeType::MemberOf, v(3), v(1)),
        Op::AddEdge(EdgeType::MemberOf, v(4), v(2)),
        Op::AddEdge(EdgeType::MemberOf, v(5), v(2)),
        Op::AddEdge(EdgeType::MemberOf, v(6), v(8)),
        Op::AddEdge(EdgeType::MemberOf, v(6), v(9)),
        Op::AddEdge(EdgeType::MemberOf, v(6), v(10)),
        Op::AddEdge(EdgeType::MemberOf, v(7), v(9)),
        Op::AddEdge(EdgeType::Allow, v(8), v(3)),
        Op::AddEdge(EdgeType::Deny, v(9), v(3)),
        Op::AddEdge(EdgeType::Allow, v(10), v(5)),
        Op::AddEdge(EdgeType::Allow, v(3), v(4)),
        Op::AddEdge(EdgeType::Allow, v(5), v(4)),
        Op::AddEdge(EdgeType::Allow, v(4), v(3)),
        Op::AddEdge(EdgeType::Deny, v(7), v(5)),
        Op::RemoveEdge(v(10), v(5)),
        Op::AddEdge(EdgeType::Deny, v(10), v(5)),
        Op::RemoveVertex(v(7)),
    ]);

    Fixture { ops, vertices }
}

async fn apply<B: GraphBackend>(backend: &B, ops: &[Op]) {
    for op in ops {
        match op {
            Op::AddVertex(v) => backend.add_vertex(v).await.unwrap(),
            Op::AddEdge(etype, s, t) => backend.add_edge(*etype, &s.id(), &t.id()).await.unwrap(),
            Op::RemoveEdge(s, t) => backend.remove_edge(&s.id(), &t.id()).await.unwrap(),
            Op::RemoveVertex(v) => backend.remove_vertex(&v.id()).await.unwrap(),
        }
    }
}

fn outcome<T: PartialEq + std::fmt::Debug>(r: Result<T, GraphError>) -> Result<T, &'static str> {
    r.map_err(|e| match e {
        GraphError::NotFound(_) => "not_found",
        GraphError::AlreadyExists(_) => "already_exists",
        _ => "other",
    })
}

#[tokio::test]
async fn backends_agree_on_queries() {
    let Some(postgres) = postgres_backend().await else {
        return;
    };
    let memory = InMemoryGraphBackend::new();
    let Fixture { ops, vertices } = fixture(&namespace());

    apply(&memory, &ops).await;
    apply(&postgres, &ops).await;

    for a in &vertices {
        assert_eq!(
            memory.vertex_exists(&a.id()).await.unwrap(),
            postgres.vertex_exists(&a.id()).await.unwrap(),
            "vertex_exists({a})"
        );
        for b in &vertices {
            let (s, t) = (a.id(), b.id());
            assert_eq!(
                memory.edge_exists(&s, &t).await.unwrap(),
                postgres.edge_exists(&s, &t).await.unwrap(),
                "edge_exists({s}, {t})"
            );
            assert_eq!(
                outcome(memory.get_edge_type(&s, &t).await),
                outcome(postgres.get_edge_type(&s, &t).await),
                "get_edge_type({s}, {t})"
            );
            assert_eq!(
                outcome(memory.shortest_paths(&s, &t).await.map(|p| path_set(&p))),
                outcome(postgres.shortest_paths(&s, &t).await.map(|p| path_set(&p))),
                "shortest_paths({s}, {t})"
            );
        }
        assert_eq!(
            outcome(memory.get_vertices_to(&a.id()).await.map(|v| id_set(&v))),
            outcome(postgres.get_vertices_to(&a.id()).await.map(|v| id_set(&v))),
            "get_vertices_to({a})"
        );
        assert_eq!(
            outcome(memory.get_vertices_from(&a.id()).await.map(|v| id_set(&v))),
            outcome(postgres.get_vertices_from(&a.id()).await.map(|v| id_set(&v))),
            "get_vertices_from({a})"
        );
    }
}
