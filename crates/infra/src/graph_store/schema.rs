//! Persistent schema for the Postgres graph backend.
//!
//! The table and column layout is a wire contract shared with other processes
//! reading the same database:
//!
//! - `vtype` enum: `actor | group | resource | resource_type | action`
//! - `etype` enum: `MEMBER_OF | ALLOW | DENY`
//! - `vertices(id TEXT PRIMARY KEY, vtype, attrs JSONB)`
//! - `edges(source_id, target_id, etype, PRIMARY KEY (source_id, target_id))`
//!   with both endpoints referencing `vertices(id) ON DELETE CASCADE`
//!
//! Every statement is idempotent so bootstrapping can run on each start.

pub const CREATE_VTYPE: &str = r#"
DO $$ BEGIN
    CREATE TYPE vtype AS ENUM ('actor', 'group', 'resource', 'resource_type', 'action');
EXCEPTION
    WHEN duplicate_object THEN NULL;
END $$;
"#;

pub const CREATE_ETYPE: &str = r#"
DO $$ BEGIN
    CREATE TYPE etype AS ENUM ('MEMBER_OF', 'ALLOW', 'DENY');
EXCEPTION
    WHEN duplicate_object THEN NULL;
END $$;
"#;

pub const CREATE_VERTICES: &str = r#"
CREATE TABLE IF NOT EXISTS vertices (
    id    TEXT PRIMARY KEY,
    vtype vtype NOT NULL,
    attrs JSONB NOT NULL DEFAULT '{}'::jsonb
);
"#;

pub const CREATE_EDGES: &str = r#"
CREATE TABLE IF NOT EXISTS edges (
    source_id TEXT NOT NULL REFERENCES vertices(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES vertices(id) ON DELETE CASCADE,
    etype     etype NOT NULL,
    PRIMARY KEY (source_id, target_id)
);
"#;

pub const CREATE_EDGES_TARGET_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS edges_target_id_idx ON edges (target_id);";

/// Bootstrap statements in dependency order.
pub const BOOTSTRAP: [&str; 5] = [
    CREATE_VTYPE,
    CREATE_ETYPE,
    CREATE_VERTICES,
    CREATE_EDGES,
    CREATE_EDGES_TARGET_INDEX,
];

/// All minimum-length simple paths from `$1` to `$2`.
///
/// Walks outward from every edge leaving the source, extending a branch one
/// hop at a time until it reaches the target. A vertex already on a branch is
/// never revisited, which keeps recursion finite on cyclic graphs; shortest
/// paths are always simple so no result is lost.
pub const SHORTEST_PATHS: &str = r#"
WITH RECURSIVE walk(head, path) AS (
        SELECT e.target_id, ARRAY[e.source_id, e.target_id]
        FROM edges e
        WHERE e.source_id = $1
    UNION ALL
        SELECT e.target_id, w.path || e.target_id
        FROM edges e
        JOIN walk w ON e.source_id = w.head
        WHERE w.head <> $2
          AND NOT (e.target_id = ANY(w.path))
),
ranked AS (
    SELECT path, rank() OVER (ORDER BY cardinality(path)) AS rnk
    FROM walk
    WHERE head = $2
)
SELECT path
FROM ranked
WHERE rnk = 1
"#;
