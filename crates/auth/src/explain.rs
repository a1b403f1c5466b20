use serde::Serialize;

use permgraph_core::{EdgeType, TieBreakerPolicy, Vertex, VertexId};

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Carries every tied shortest path with the edge that ends it, so a caller
/// can see which grants and denials were weighed against each other.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub actor: VertexId,
    pub action: VertexId,

    /// Whether the authorization was granted.
    pub granted: bool,

    /// Tie-breaker in force when the decision was made.
    pub policy: TieBreakerPolicy,

    /// What the decision rested on.
    pub basis: DecisionBasis,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// The tied shortest paths, in backend order. Empty unless a path exists.
    pub paths: Vec<PathVerdict>,
}

/// One shortest path and the permission edge it ends in.
#[derive(Debug, Clone, Serialize)]
pub struct PathVerdict {
    pub path: Vec<Vertex>,
    pub terminal: EdgeType,
}

impl PathVerdict {
    pub fn permits(&self) -> bool {
        self.terminal == EdgeType::Allow
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    /// The actor or the action is not in the graph.
    UnknownVertex,
    /// No path connects the actor to the action.
    NoPath,
    /// Exactly one shortest path.
    SinglePath,
    /// Several shortest paths of equal length, resolved by the tie-breaker.
    TieBreak,
}

impl AuthorizationExplanation {
    pub(crate) fn denied(
        actor: VertexId,
        action: VertexId,
        policy: TieBreakerPolicy,
        basis: DecisionBasis,
        reason: String,
    ) -> Self {
        Self {
            actor,
            action,
            granted: false,
            policy,
            basis,
            reason,
            paths: Vec::new(),
        }
    }

    /// Resolve a non-empty set of tied paths.
    pub(crate) fn decide(
        actor: VertexId,
        action: VertexId,
        policy: TieBreakerPolicy,
        paths: Vec<PathVerdict>,
    ) -> Self {
        let hops = paths.first().map_or(0, |p| p.path.len().saturating_sub(1));
        let allowing = paths.iter().filter(|p| p.permits()).count();

        let (granted, basis, reason) = match paths.as_slice() {
            [only] => {
                let granted = only.permits();
                (
                    granted,
                    DecisionBasis::SinglePath,
                    format!("single shortest path of {hops} hop(s) ends in {}", only.terminal),
                )
            }
            _ => {
                let granted = policy.resolve(paths.iter().map(PathVerdict::permits));
                (
                    granted,
                    DecisionBasis::TieBreak,
                    format!(
                        "{} shortest paths of {hops} hop(s), {allowing} ending in ALLOW; resolved by {policy}",
                        paths.len()
                    ),
                )
            }
        };

        Self {
            actor,
            action,
            granted,
            policy,
            basis,
            reason,
            paths,
        }
    }

    /// First tied path that ends in `ALLOW`.
    pub fn granting_path(&self) -> Option<&[Vertex]> {
        self.paths
            .iter()
            .find(|p| p.permits())
            .map(|p| p.path.as_slice())
    }
}
