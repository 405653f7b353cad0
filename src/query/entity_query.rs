#![forbid(unsafe_code)]

//! Abstract entity query and paging wire shapes.
//!
//! These are the language-agnostic structures callers (GraphQL resolvers,
//! admin API handlers) build before handing off to the query generator.
//! Empty lists mean "no filter", not "match nothing".

use serde::{Deserialize, Serialize};

/// Lifecycle status of an entity's latest version.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityStatus {
    /// Never published.
    Draft,
    /// Latest version is published.
    Published,
    /// Published, but a newer draft exists.
    Modified,
    /// Previously published, then withdrawn.
    Withdrawn,
    /// Archived.
    Archived,
}

impl EntityStatus {
    /// Wire/database representation of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Draft => "draft",
            EntityStatus::Published => "published",
            EntityStatus::Modified => "modified",
            EntityStatus::Withdrawn => "withdrawn",
            EntityStatus::Archived => "archived",
        }
    }
}

/// Sort order for entity searches. Each value maps to exactly one physical
/// sort column.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityQueryOrder {
    /// Creation order. Backed by the internal id column, which is assigned
    /// in creation order.
    #[default]
    CreatedAt,
    /// Last update time.
    UpdatedAt,
    /// Entity name.
    Name,
}

/// Geographic bounding box filter over location fields.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Western edge. May exceed `max_lng` when the box wraps the
    /// antimeridian.
    pub min_lng: f64,
    /// Eastern edge.
    pub max_lng: f64,
}

/// Reference-graph endpoint, identified by internal entity id.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EntityLink {
    /// Internal `entities.id` of the link endpoint.
    pub id: i64,
}

/// Abstract entity query. All present filters combine with AND.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityQuery {
    /// Restrict to these entity types. Empty means all types.
    pub entity_types: Vec<String>,
    /// Restrict to these statuses (admin queries only). Empty means all.
    pub status: Vec<EntityStatus>,
    /// Entities that reference the given entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links_to: Option<EntityLink>,
    /// Entities referenced by the given entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links_from: Option<EntityLink>,
    /// Entities with a location inside the box.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Full-text search query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Sort order. Defaults to creation order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<EntityQueryOrder>,
    /// Flip the sort direction.
    pub reverse: bool,
}

/// Relay-style paging arguments.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Paging {
    /// Page size when paging forwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<u32>,
    /// Opaque cursor to continue after.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Page size when paging backwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<u32>,
    /// Opaque cursor to stop before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

/// A logical auth key paired with the physical partition key it resolved
/// to. Resolution happens in an external collaborator; the generator only
/// filters on the resolved values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedAuthKey {
    /// Logical auth key as supplied by the caller.
    pub auth_key: String,
    /// Physical partition key used in queries.
    pub resolved_auth_key: String,
}

impl ResolvedAuthKey {
    /// Convenience constructor.
    pub fn new(auth_key: impl Into<String>, resolved_auth_key: impl Into<String>) -> Self {
        Self {
            auth_key: auth_key.into(),
            resolved_auth_key: resolved_auth_key.into(),
        }
    }
}
