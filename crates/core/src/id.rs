//! Vertex identifiers and vertex kinds.
//!
//! Every vertex is addressed by a composite identifier whose first segment is
//! its kind (`actor:alice`, `resource:Document:MyDoc`, ...). Identifiers are the
//! only cross-process representation of a vertex.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Separator between identifier segments.
pub const ID_SEPARATOR: char = ':';

/// The kind of a vertex (`vtype` on the wire).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKind {
    Actor,
    Group,
    Resource,
    ResourceType,
    Action,
}

impl VertexKind {
    pub const ALL: [VertexKind; 5] = [
        VertexKind::Actor,
        VertexKind::Group,
        VertexKind::Resource,
        VertexKind::ResourceType,
        VertexKind::Action,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VertexKind::Actor => "actor",
            VertexKind::Group => "group",
            VertexKind::Resource => "resource",
            VertexKind::ResourceType => "resource_type",
            VertexKind::Action => "action",
        }
    }
}

impl core::fmt::Display for VertexKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VertexKind {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VertexKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| GraphError::invalid_vertex(format!("unrecognized vertex type '{s}'")))
    }
}

/// Globally unique, immutable vertex identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(String);

impl VertexId {
    /// Wrap an identifier string without validating it.
    ///
    /// Validation happens when the id is turned back into a [`crate::Vertex`].
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub(crate) fn from_segments(kind: VertexKind, segments: &[&str]) -> Self {
        let mut id = String::from(kind.as_str());
        for segment in segments {
            id.push(ID_SEPARATOR);
            id.push_str(segment);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Parse the kind prefix of this identifier.
    pub fn kind(&self) -> Result<VertexKind, GraphError> {
        let (prefix, _) = self.split_prefix()?;
        prefix.parse()
    }

    /// Split `kind:rest` into its two halves.
    pub(crate) fn split_prefix(&self) -> Result<(&str, &str), GraphError> {
        self.0
            .split_once(ID_SEPARATOR)
            .ok_or_else(|| GraphError::invalid_vertex(format!("malformed vertex id '{}'", self.0)))
    }
}

impl core::fmt::Display for VertexId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VertexId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for VertexId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for VertexId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<VertexId> for String {
    fn from(value: VertexId) -> Self {
        value.0
    }
}
