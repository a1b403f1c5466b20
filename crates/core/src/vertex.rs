//! Typed vertex records and the closed [`Vertex`] sum type.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::id::{ID_SEPARATOR, VertexId, VertexKind};

/// A type of resource with an ordered set of supported action names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceType {
    pub name: String,
    pub actions: Vec<String>,
}

impl ResourceType {
    pub fn new<I, S>(name: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            actions: actions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn id(&self) -> VertexId {
        VertexId::from_segments(VertexKind::ResourceType, &[&self.name])
    }

    pub fn declares(&self, action_name: &str) -> bool {
        self.actions.iter().any(|a| a == action_name)
    }
}

/// An identity that takes actions on resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn id(&self) -> VertexId {
        VertexId::from_segments(VertexKind::Actor, &[&self.name])
    }
}

/// A named collection of actors sharing permission policies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn id(&self) -> VertexId {
        VertexId::from_segments(VertexKind::Group, &[&self.name])
    }
}

/// A resource whose actions require authorization.
///
/// `resource_type` is the name of the [`ResourceType`], used as a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub resource_type: String,
}

impl Resource {
    pub fn new(name: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
        }
    }

    pub fn id(&self) -> VertexId {
        VertexId::from_segments(VertexKind::Resource, &[&self.resource_type, &self.name])
    }

    pub fn resource_type_id(&self) -> VertexId {
        VertexId::from_segments(VertexKind::ResourceType, &[&self.resource_type])
    }

    /// The action vertex `name` scoped to this resource.
    pub fn action(&self, name: impl Into<String>) -> Action {
        Action::new(name, self.resource_type.clone(), self.name.clone())
    }
}

/// One permissible operation on one specific resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub resource_type: String,
    pub resource: String,
}

impl Action {
    pub fn new(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            resource: resource.into(),
        }
    }

    pub fn id(&self) -> VertexId {
        VertexId::from_segments(
            VertexKind::Action,
            &[&self.resource_type, &self.resource, &self.name],
        )
    }

    pub fn resource(&self) -> Resource {
        Resource::new(self.resource.clone(), self.resource_type.clone())
    }

    pub fn resource_type_id(&self) -> VertexId {
        VertexId::from_segments(VertexKind::ResourceType, &[&self.resource_type])
    }
}

/// Stored attributes of a vertex.
///
/// Which fields are populated depends on the vertex kind; the kind itself is
/// carried by the identifier. Serialized as a JSON object with absent fields
/// omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl VertexAttributes {
    /// Overwrite every field that is present in `other`.
    pub fn merge(&mut self, other: VertexAttributes) {
        if other.actions.is_some() {
            self.actions = other.actions;
        }
        if other.resource_type.is_some() {
            self.resource_type = other.resource_type;
        }
        if other.resource.is_some() {
            self.resource = other.resource;
        }
    }

    pub fn to_json(&self) -> GraphResult<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| GraphError::storage(format!("attribute serialization failed: {e}")))
    }

    pub fn from_json(value: serde_json::Value) -> GraphResult<Self> {
        // Older rows may carry a JSON null instead of an empty object.
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| GraphError::invalid_vertex(format!("malformed vertex attributes: {e}")))
    }
}

/// A vertex in the permission graph.
///
/// Equality and hashing use the identifier only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "vtype", rename_all = "snake_case")]
pub enum Vertex {
    Actor(Actor),
    Group(Group),
    Resource(Resource),
    ResourceType(ResourceType),
    Action(Action),
}

impl Vertex {
    pub fn id(&self) -> VertexId {
        match self {
            Vertex::Actor(v) => v.id(),
            Vertex::Group(v) => v.id(),
            Vertex::Resource(v) => v.id(),
            Vertex::ResourceType(v) => v.id(),
            Vertex::Action(v) => v.id(),
        }
    }

    pub fn kind(&self) -> VertexKind {
        match self {
            Vertex::Actor(_) => VertexKind::Actor,
            Vertex::Group(_) => VertexKind::Group,
            Vertex::Resource(_) => VertexKind::Resource,
            Vertex::ResourceType(_) => VertexKind::ResourceType,
            Vertex::Action(_) => VertexKind::Action,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Vertex::Actor(v) => &v.name,
            Vertex::Group(v) => &v.name,
            Vertex::Resource(v) => &v.name,
            Vertex::ResourceType(v) => &v.name,
            Vertex::Action(v) => &v.name,
        }
    }

    /// The attributes this vertex stores alongside its identifier.
    pub fn attributes(&self) -> VertexAttributes {
        match self {
            Vertex::Actor(_) | Vertex::Group(_) => VertexAttributes::default(),
            Vertex::ResourceType(rt) => VertexAttributes {
                actions: Some(rt.actions.clone()),
                ..Default::default()
            },
            Vertex::Resource(r) => VertexAttributes {
                resource_type: Some(r.resource_type.clone()),
                ..Default::default()
            },
            Vertex::Action(a) => VertexAttributes {
                resource_type: Some(a.resource_type.clone()),
                resource: Some(a.resource.clone()),
                ..Default::default()
            },
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Vertex::Action(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Vertex::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_resource_type(&self) -> Option<&ResourceType> {
        match self {
            Vertex::ResourceType(rt) => Some(rt),
            _ => None,
        }
    }

    pub fn as_actor(&self) -> Option<&Actor> {
        match self {
            Vertex::Actor(a) => Some(a),
            _ => None,
        }
    }

    /// Reconstruct a vertex from its identifier and stored attributes.
    ///
    /// Interior identifier segments (resource type, resource) are taken from the
    /// attributes, and the trailing name is whatever follows them in the id.
    pub fn from_parts(id: &VertexId, attrs: &VertexAttributes) -> GraphResult<Self> {
        let (prefix, rest) = id.split_prefix()?;
        let kind: VertexKind = prefix.parse()?;

        let vertex = match kind {
            VertexKind::Actor => Vertex::Actor(Actor::new(rest)),
            VertexKind::Group => Vertex::Group(Group::new(rest)),
            VertexKind::ResourceType => {
                let actions = require(id, "actions", attrs.actions.as_ref())?;
                Vertex::ResourceType(ResourceType::new(rest, actions.iter().cloned()))
            }
            VertexKind::Resource => {
                let resource_type = require(id, "resource_type", attrs.resource_type.as_ref())?;
                let name = strip_segments(id, rest, &[resource_type])?;
                Vertex::Resource(Resource::new(name, resource_type.clone()))
            }
            VertexKind::Action => {
                let resource_type = require(id, "resource_type", attrs.resource_type.as_ref())?;
                let resource = require(id, "resource", attrs.resource.as_ref())?;
                let name = strip_segments(id, rest, &[resource_type, resource])?;
                Vertex::Action(Action::new(name, resource_type.clone(), resource.clone()))
            }
        };

        if vertex.name().is_empty() {
            return Err(GraphError::invalid_vertex(format!("vertex id '{id}' has an empty name")));
        }
        Ok(vertex)
    }

    /// Check naming rules before a vertex is created.
    ///
    /// Resource-type and resource names are interior id segments and may not
    /// contain the separator. Action names must be unique within a type.
    pub fn validate(&self) -> GraphResult<()> {
        check_name("name", self.name())?;
        match self {
            Vertex::Actor(_) | Vertex::Group(_) => Ok(()),
            Vertex::ResourceType(rt) => {
                check_segment("resource type name", &rt.name)?;
                validate_action_names(&rt.actions)
            }
            Vertex::Resource(r) => {
                check_segment("resource name", &r.name)?;
                check_segment("resource type name", &r.resource_type)
            }
            Vertex::Action(a) => {
                check_segment("resource type name", &a.resource_type)?;
                check_segment("resource name", &a.resource)
            }
        }
    }
}

/// Action names must be non-empty and unique within a resource type.
pub fn validate_action_names(actions: &[String]) -> GraphResult<()> {
    let mut seen = HashSet::with_capacity(actions.len());
    for action in actions {
        check_name("action name", action)?;
        if !seen.insert(action.as_str()) {
            return Err(GraphError::invalid_vertex(format!("duplicate action name '{action}'")));
        }
    }
    Ok(())
}

fn check_name(what: &str, name: &str) -> GraphResult<()> {
    if name.is_empty() {
        return Err(GraphError::invalid_vertex(format!("{what} must not be empty")));
    }
    Ok(())
}

fn check_segment(what: &str, name: &str) -> GraphResult<()> {
    check_name(what, name)?;
    if name.contains(ID_SEPARATOR) {
        return Err(GraphError::invalid_vertex(format!(
            "{what} '{name}' must not contain '{ID_SEPARATOR}'"
        )));
    }
    Ok(())
}

fn require<'a, T>(id: &VertexId, attr: &str, value: Option<&'a T>) -> GraphResult<&'a T> {
    value.ok_or_else(|| {
        GraphError::invalid_vertex(format!("vertex '{id}' is missing attribute '{attr}'"))
    })
}

fn strip_segments<'a>(id: &VertexId, rest: &'a str, segments: &[&String]) -> GraphResult<&'a str> {
    let mut remaining = rest;
    for segment in segments {
        remaining = remaining
            .strip_prefix(segment.as_str())
            .and_then(|r| r.strip_prefix(ID_SEPARATOR))
            .ok_or_else(|| {
                GraphError::invalid_vertex(format!(
                    "vertex id '{id}' does not match its attribute '{segment}'"
                ))
            })?;
    }
    Ok(remaining)
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Vertex {}

impl core::hash::Hash for Vertex {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl core::fmt::Display for Vertex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.id(), f)
    }
}

macro_rules! impl_vertex_from {
    ($t:ident) => {
        impl From<$t> for Vertex {
            fn from(value: $t) -> Self {
                Vertex::$t(value)
            }
        }

        impl From<&$t> for Vertex {
            fn from(value: &$t) -> Self {
                Vertex::$t(value.clone())
            }
        }
    };
}

impl_vertex_from!(Actor);
impl_vertex_from!(Group);
impl_vertex_from!(Resource);
impl_vertex_from!(ResourceType);
impl_vertex_from!(Action);

impl From<&Vertex> for Vertex {
    fn from(value: &Vertex) -> Self {
        value.clone()
    }
}
