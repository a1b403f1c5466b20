//! Typed directed edges.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::id::VertexKind;

/// Type of an edge (`etype` on the wire).
///
/// - `MemberOf`: membership in a collection (actor in group, resource in type,
///   action in resource)
/// - `Allow`: positive permission to take an action
/// - `Deny`: negative permission to take an action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    MemberOf,
    Allow,
    Deny,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::MemberOf => "MEMBER_OF",
            EdgeType::Allow => "ALLOW",
            EdgeType::Deny => "DENY",
        }
    }

    /// Whether an edge of this type may connect a `source` kind to a `target` kind.
    pub fn connects(self, source: VertexKind, target: VertexKind) -> bool {
        use VertexKind::*;
        match self {
            EdgeType::MemberOf => matches!(
                (source, target),
                (Actor, Group) | (Resource, ResourceType) | (Action, Resource)
            ),
            EdgeType::Allow | EdgeType::Deny => {
                matches!(source, Actor | Group | Action) && target == Action
            }
        }
    }
}

impl core::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MEMBER_OF" => Ok(EdgeType::MemberOf),
            "ALLOW" => Ok(EdgeType::Allow),
            "DENY" => Ok(EdgeType::Deny),
            other => Err(GraphError::storage(format!("unrecognized edge type '{other}'"))),
        }
    }
}
