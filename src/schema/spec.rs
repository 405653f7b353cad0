#![forbid(unsafe_code)]

//! In-memory and wire (JSON) representation of schema specifications.
//!
//! A schema declares entity and component types, their fields, named
//! regex patterns, and named unique indexes. Field specifications are a
//! closed tagged union over the supported field kinds so every consumer
//! gets exhaustiveness checking from the compiler.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::migration::SchemaVersionMigration;

/// Rich-text node names that every constrained rich-text field must allow.
pub const REQUIRED_RICH_TEXT_NODES: [&str; 4] = ["root", "paragraph", "text", "linebreak"];

/// Which read surface a schema specification describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaKind {
    /// Latest (possibly unpublished) view, including admin-only members.
    Admin,
    /// Projection visible through the published read surface.
    Published,
}

/// A named regular expression referenced by auth-key and match patterns.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SchemaPatternSpecification {
    /// Stable pattern name.
    pub name: String,
    /// Regular expression source text.
    pub pattern: String,
}

/// Kind of a named index. Only unique indexes exist today.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaIndexType {
    /// Values must be unique across all entities.
    Unique,
}

/// A named index that string fields can bind to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SchemaIndexSpecification {
    /// Stable index name. Which index a field binds to is part of the
    /// field's frozen contract.
    pub name: String,
    /// Index kind.
    #[serde(rename = "type")]
    pub index_type: SchemaIndexType,
}

/// Specification shared by entity types and component types.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpecification {
    /// Stable type identity.
    pub name: String,
    /// Hidden from the published surface when set.
    #[serde(default)]
    pub admin_only: bool,
    /// Name of a pattern constraining entity auth keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key_pattern: Option<String>,
    /// Name of the field used as the entity display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
    /// Whether entities of this type can be published.
    #[serde(default = "default_true")]
    pub publishable: bool,
    /// Ordered field specifications, keyed by unique name within the type.
    #[serde(default)]
    pub fields: Vec<FieldSpecification>,
}

impl TypeSpecification {
    /// Looks up a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldSpecification> {
        self.fields.iter().find(|field| field.name() == name)
    }
}

fn default_true() -> bool {
    true
}

/// Attributes common to every field kind.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFieldSpecification {
    /// Field name, unique within the owning type.
    pub name: String,
    /// Whether the field holds a list of values.
    #[serde(default)]
    pub list: bool,
    /// Whether a value is required for publishing.
    #[serde(default)]
    pub required: bool,
    /// Hidden from the published surface when set.
    #[serde(default)]
    pub admin_only: bool,
}

/// Boolean field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanFieldSpecification {
    /// Common field attributes.
    #[serde(flatten)]
    pub shared: SharedFieldSpecification,
}

/// String field, optionally constrained by a pattern, a closed value set,
/// or bound to a unique index.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringFieldSpecification {
    /// Common field attributes.
    #[serde(flatten)]
    pub shared: SharedFieldSpecification,
    /// Whether multi-line input is expected.
    #[serde(default)]
    pub multiline: bool,
    /// Name of the unique index the field is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Name of a pattern values must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
    /// Closed set of allowed values. Empty means unconstrained.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Number field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberFieldSpecification {
    /// Common field attributes.
    #[serde(flatten)]
    pub shared: SharedFieldSpecification,
    /// Restrict values to integers.
    #[serde(default)]
    pub integer: bool,
}

/// Geographic location field (latitude/longitude pair).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFieldSpecification {
    /// Common field attributes.
    #[serde(flatten)]
    pub shared: SharedFieldSpecification,
}

/// Reference to another entity.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceFieldSpecification {
    /// Common field attributes.
    #[serde(flatten)]
    pub shared: SharedFieldSpecification,
    /// Allowed entity types. Empty means any type is allowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<String>,
}

/// Embedded component value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentFieldSpecification {
    /// Common field attributes.
    #[serde(flatten)]
    pub shared: SharedFieldSpecification,
    /// Allowed component types. Empty means any type is allowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_types: Vec<String>,
}

/// Rich-text document field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichTextFieldSpecification {
    /// Common field attributes.
    #[serde(flatten)]
    pub shared: SharedFieldSpecification,
    /// Entity types allowed in embedded entity nodes. Empty means any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_types: Vec<String>,
    /// Entity types allowed in link nodes. Empty means any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_entity_types: Vec<String>,
    /// Component types allowed in embedded component nodes. Empty means any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_types: Vec<String>,
    /// Allowed node names. Empty means all nodes; a non-empty set must
    /// include [`REQUIRED_RICH_TEXT_NODES`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rich_text_nodes: Vec<String>,
}

/// Tagged union over the supported field kinds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldSpecification {
    /// Boolean field.
    Boolean(BooleanFieldSpecification),
    /// String field.
    String(StringFieldSpecification),
    /// Number field.
    Number(NumberFieldSpecification),
    /// Location field.
    Location(LocationFieldSpecification),
    /// Entity reference field.
    Reference(ReferenceFieldSpecification),
    /// Embedded component field.
    Component(ComponentFieldSpecification),
    /// Rich-text field.
    RichText(RichTextFieldSpecification),
}

impl FieldSpecification {
    /// Common attributes regardless of kind.
    pub fn shared(&self) -> &SharedFieldSpecification {
        match self {
            FieldSpecification::Boolean(field) => &field.shared,
            FieldSpecification::String(field) => &field.shared,
            FieldSpecification::Number(field) => &field.shared,
            FieldSpecification::Location(field) => &field.shared,
            FieldSpecification::Reference(field) => &field.shared,
            FieldSpecification::Component(field) => &field.shared,
            FieldSpecification::RichText(field) => &field.shared,
        }
    }

    pub(crate) fn shared_mut(&mut self) -> &mut SharedFieldSpecification {
        match self {
            FieldSpecification::Boolean(field) => &mut field.shared,
            FieldSpecification::String(field) => &mut field.shared,
            FieldSpecification::Number(field) => &mut field.shared,
            FieldSpecification::Location(field) => &mut field.shared,
            FieldSpecification::Reference(field) => &mut field.shared,
            FieldSpecification::Component(field) => &mut field.shared,
            FieldSpecification::RichText(field) => &mut field.shared,
        }
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.shared().name
    }

    /// Whether the field holds a list of values.
    pub fn is_list(&self) -> bool {
        self.shared().list
    }

    /// Whether a value is required for publishing.
    pub fn required(&self) -> bool {
        self.shared().required
    }

    /// Whether the field is hidden from the published surface.
    pub fn admin_only(&self) -> bool {
        self.shared().admin_only
    }

    /// The wire name of the field kind (`"Boolean"`, `"String"`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldSpecification::Boolean(_) => "Boolean",
            FieldSpecification::String(_) => "String",
            FieldSpecification::Number(_) => "Number",
            FieldSpecification::Location(_) => "Location",
            FieldSpecification::Reference(_) => "Reference",
            FieldSpecification::Component(_) => "Component",
            FieldSpecification::RichText(_) => "RichText",
        }
    }

    /// The index name a string field is bound to, if any.
    pub fn index(&self) -> Option<&str> {
        match self {
            FieldSpecification::String(field) => field.index.as_deref(),
            _ => None,
        }
    }

    /// Deduplicates entries in the field's name-list attributes, keeping
    /// first occurrences. Normalization, not a validation failure.
    pub(crate) fn normalize(&mut self) {
        match self {
            FieldSpecification::String(field) => dedup_in_place(&mut field.values),
            FieldSpecification::Reference(field) => dedup_in_place(&mut field.entity_types),
            FieldSpecification::Component(field) => dedup_in_place(&mut field.component_types),
            FieldSpecification::RichText(field) => {
                dedup_in_place(&mut field.entity_types);
                dedup_in_place(&mut field.link_entity_types);
                dedup_in_place(&mut field.component_types);
                dedup_in_place(&mut field.rich_text_nodes);
            }
            FieldSpecification::Boolean(_)
            | FieldSpecification::Number(_)
            | FieldSpecification::Location(_) => {}
        }
    }
}

pub(crate) fn dedup_in_place(values: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(values.len());
    values.retain(|value| {
        if seen.contains(value) {
            false
        } else {
            seen.push(value.clone());
            true
        }
    });
}

/// A schema specification without its migration log, the shape served to
/// read-only consumers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSpecification {
    /// Which read surface this specification describes.
    pub schema_kind: SchemaKind,
    /// Monotonic version, incremented by one per accepted update.
    pub version: u32,
    /// Entity type specifications.
    pub entity_types: Vec<TypeSpecification>,
    /// Component type specifications.
    pub component_types: Vec<TypeSpecification>,
    /// Named regex patterns referenced by types and fields.
    pub patterns: Vec<SchemaPatternSpecification>,
    /// Named unique indexes referenced by string fields.
    pub indexes: Vec<SchemaIndexSpecification>,
}

/// The persisted schema shape: a [`SchemaSpecification`] plus the ordered
/// (newest-first) structural migration log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSpecificationWithMigrations {
    /// Which read surface this specification describes.
    pub schema_kind: SchemaKind,
    /// Monotonic version, incremented by one per accepted update.
    pub version: u32,
    /// Entity type specifications.
    pub entity_types: Vec<TypeSpecification>,
    /// Component type specifications.
    pub component_types: Vec<TypeSpecification>,
    /// Named regex patterns referenced by types and fields.
    pub patterns: Vec<SchemaPatternSpecification>,
    /// Named unique indexes referenced by string fields.
    pub indexes: Vec<SchemaIndexSpecification>,
    /// Structural migration log, newest first.
    pub migrations: Vec<SchemaVersionMigration>,
}

impl Default for SchemaSpecificationWithMigrations {
    fn default() -> Self {
        Self {
            schema_kind: SchemaKind::Admin,
            version: 0,
            entity_types: Vec::new(),
            component_types: Vec::new(),
            patterns: Vec::new(),
            indexes: Vec::new(),
            migrations: Vec::new(),
        }
    }
}

impl SchemaSpecificationWithMigrations {
    /// Drops the migration log, producing the read-only wire shape.
    pub fn into_spec(self) -> SchemaSpecification {
        SchemaSpecification {
            schema_kind: self.schema_kind,
            version: self.version,
            entity_types: self.entity_types,
            component_types: self.component_types,
            patterns: self.patterns,
            indexes: self.indexes,
        }
    }

    pub(crate) fn get_pattern(&self, name: &str) -> Option<&SchemaPatternSpecification> {
        self.patterns.iter().find(|pattern| pattern.name == name)
    }

    pub(crate) fn get_index(&self, name: &str) -> Option<&SchemaIndexSpecification> {
        self.indexes.iter().find(|index| index.name == name)
    }

    pub(crate) fn normalize(&mut self) {
        for type_spec in self
            .entity_types
            .iter_mut()
            .chain(self.component_types.iter_mut())
        {
            for field in &mut type_spec.fields {
                field.normalize();
            }
        }
    }
}

/// A validated, immutable schema. The only way to obtain one is
/// [`Schema::create_and_validate`] or
/// [`Schema::update_and_validate`](crate::schema::SchemaSpecificationUpdate),
/// so holding a `Schema` implies every internal reference resolves.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    pub(crate) spec: SchemaSpecificationWithMigrations,
}

impl Schema {
    /// Validates the supplied specification and wraps it.
    pub fn create_and_validate(mut spec: SchemaSpecificationWithMigrations) -> Result<Self> {
        spec.normalize();
        crate::schema::validate::validate_spec(&spec)?;
        Ok(Self { spec })
    }

    /// An empty admin schema at version 0, the starting point before any
    /// update has been accepted.
    pub fn empty() -> Self {
        Self {
            spec: SchemaSpecificationWithMigrations::default(),
        }
    }

    /// The underlying specification.
    pub fn spec(&self) -> &SchemaSpecificationWithMigrations {
        &self.spec
    }

    /// Consumes the schema, returning the specification.
    pub fn into_spec(self) -> SchemaSpecificationWithMigrations {
        self.spec
    }

    /// Looks up an entity type by name.
    pub fn get_entity_type(&self, name: &str) -> Option<&TypeSpecification> {
        self.spec
            .entity_types
            .iter()
            .find(|type_spec| type_spec.name == name)
    }

    /// Looks up a component type by name.
    pub fn get_component_type(&self, name: &str) -> Option<&TypeSpecification> {
        self.spec
            .component_types
            .iter()
            .find(|type_spec| type_spec.name == name)
    }
}
