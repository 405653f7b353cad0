#![forbid(unsafe_code)]

//! The schema update/merge engine.
//!
//! [`Schema::update_and_validate`] performs a single transition
//! `(current schema, update) -> new schema | error`. Attributes omitted
//! from the update are carried forward from the existing specification;
//! structurally incompatible deltas (type/list/adminOnly/index changes on
//! existing members) are hard errors naming the offending member and the
//! old/new values. No partial application: either a fresh validated schema
//! is returned or the original is untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DossierError, Result};
use crate::schema::migration::{self, SchemaVersionMigration};
use crate::schema::spec::{
    dedup_in_place, BooleanFieldSpecification, ComponentFieldSpecification, FieldSpecification,
    LocationFieldSpecification, NumberFieldSpecification, ReferenceFieldSpecification,
    RichTextFieldSpecification, Schema, SchemaIndexSpecification, SchemaPatternSpecification,
    SchemaSpecificationWithMigrations, SharedFieldSpecification, StringFieldSpecification,
    TypeSpecification,
};

/// Partial schema update. Types and fields are matched to existing members
/// by name; omitted attributes carry forward unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchemaSpecificationUpdate {
    /// Entity types to add or update.
    pub entity_types: Vec<TypeSpecificationUpdate>,
    /// Component types to add or update.
    pub component_types: Vec<TypeSpecificationUpdate>,
    /// Patterns to add or replace by name. Pattern text changes for an
    /// existing name are legal and take effect immediately.
    pub patterns: Vec<SchemaPatternSpecification>,
    /// Indexes to add or replace by name.
    pub indexes: Vec<SchemaIndexSpecification>,
    /// New migration entries, each versioned `current version + 1`.
    pub migrations: Vec<SchemaVersionMigration>,
}

impl SchemaSpecificationUpdate {
    fn is_empty(&self) -> bool {
        self.entity_types.is_empty()
            && self.component_types.is_empty()
            && self.patterns.is_empty()
            && self.indexes.is_empty()
            && self.migrations.is_empty()
    }
}

/// Update payload for one entity or component type. The update always
/// refers to the type by its current name; renames go through migration
/// actions instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpecificationUpdate {
    /// Current name of the type.
    pub name: String,
    /// New adminOnly value. Changing it on an existing type is an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_only: Option<bool>,
    /// New authKeyPattern. Omitted carries the existing value forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key_pattern: Option<String>,
    /// New nameField. Omitted carries the existing value forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
    /// New publishable value. Omitted carries the existing value forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publishable: Option<bool>,
    /// Fields to add or update. Existing fields omitted here are carried
    /// forward unchanged, in their existing order.
    #[serde(default)]
    pub fields: Vec<FieldSpecificationUpdate>,
}

/// Shared optional attributes of a field update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFieldUpdate {
    /// Field name within the owning type.
    pub name: String,
    /// New list value. Changing it on an existing field is an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<bool>,
    /// New required value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// New adminOnly value. Changing it on an existing field is an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_only: Option<bool>,
}

/// Boolean field update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanFieldUpdate {
    /// Common attributes.
    #[serde(flatten)]
    pub shared: SharedFieldUpdate,
}

/// String field update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringFieldUpdate {
    /// Common attributes.
    #[serde(flatten)]
    pub shared: SharedFieldUpdate,
    /// New multiline value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiline: Option<bool>,
    /// New index binding. Changing it on an existing field is an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// New matchPattern name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
    /// New closed value set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// Number field update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberFieldUpdate {
    /// Common attributes.
    #[serde(flatten)]
    pub shared: SharedFieldUpdate,
    /// New integer restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<bool>,
}

/// Location field update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFieldUpdate {
    /// Common attributes.
    #[serde(flatten)]
    pub shared: SharedFieldUpdate,
}

/// Reference field update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceFieldUpdate {
    /// Common attributes.
    #[serde(flatten)]
    pub shared: SharedFieldUpdate,
    /// New allowed entity types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<String>>,
}

/// Component field update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentFieldUpdate {
    /// Common attributes.
    #[serde(flatten)]
    pub shared: SharedFieldUpdate,
    /// New allowed component types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_types: Option<Vec<String>>,
}

/// Rich-text field update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RichTextFieldUpdate {
    /// Common attributes.
    #[serde(flatten)]
    pub shared: SharedFieldUpdate,
    /// New allowed entity types for embedded entity nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_types: Option<Vec<String>>,
    /// New allowed entity types for link nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_entity_types: Option<Vec<String>>,
    /// New allowed component types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_types: Option<Vec<String>>,
    /// New allowed node names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rich_text_nodes: Option<Vec<String>>,
}

/// Field update, tagged by kind so that illegal kind changes on existing
/// fields are detectable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FieldSpecificationUpdate {
    /// Boolean field.
    Boolean(BooleanFieldUpdate),
    /// String field.
    String(StringFieldUpdate),
    /// Number field.
    Number(NumberFieldUpdate),
    /// Location field.
    Location(LocationFieldUpdate),
    /// Entity reference field.
    Reference(ReferenceFieldUpdate),
    /// Embedded component field.
    Component(ComponentFieldUpdate),
    /// Rich-text field.
    RichText(RichTextFieldUpdate),
}

impl FieldSpecificationUpdate {
    fn shared(&self) -> &SharedFieldUpdate {
        match self {
            FieldSpecificationUpdate::Boolean(field) => &field.shared,
            FieldSpecificationUpdate::String(field) => &field.shared,
            FieldSpecificationUpdate::Number(field) => &field.shared,
            FieldSpecificationUpdate::Location(field) => &field.shared,
            FieldSpecificationUpdate::Reference(field) => &field.shared,
            FieldSpecificationUpdate::Component(field) => &field.shared,
            FieldSpecificationUpdate::RichText(field) => &field.shared,
        }
    }

    fn name(&self) -> &str {
        &self.shared().name
    }

    fn type_name(&self) -> &'static str {
        match self {
            FieldSpecificationUpdate::Boolean(_) => "Boolean",
            FieldSpecificationUpdate::String(_) => "String",
            FieldSpecificationUpdate::Number(_) => "Number",
            FieldSpecificationUpdate::Location(_) => "Location",
            FieldSpecificationUpdate::Reference(_) => "Reference",
            FieldSpecificationUpdate::Component(_) => "Component",
            FieldSpecificationUpdate::RichText(_) => "RichText",
        }
    }
}

impl Schema {
    /// Merges the update into this schema, applies any new migration
    /// actions, prunes unused patterns and indexes, re-validates, and
    /// returns a fresh schema with the version bumped by exactly one.
    ///
    /// A no-op update (nothing actually differs) returns a schema equal to
    /// this one with the version unchanged.
    pub fn update_and_validate(&self, update: &SchemaSpecificationUpdate) -> Result<Schema> {
        let old = &self.spec;
        if update.is_empty() {
            return Ok(self.clone());
        }

        let mut entity_types = merge_types(&old.entity_types, &update.entity_types)?;
        let mut component_types = merge_types(&old.component_types, &update.component_types)?;
        let patterns = merge_by_name(&old.patterns, &update.patterns, |pattern| &pattern.name);
        let indexes = merge_by_name(&old.indexes, &update.indexes, |index| &index.name);

        // Empty-action entries are pruned before any version bookkeeping.
        let submitted: Vec<SchemaVersionMigration> = update
            .migrations
            .iter()
            .filter(|migration| !migration.actions.is_empty())
            .cloned()
            .collect();
        migration::validate_new_migrations(old.version, &old.migrations, &submitted)?;

        let unchanged = submitted.is_empty()
            && entity_types == old.entity_types
            && component_types == old.component_types
            && patterns == old.patterns
            && indexes == old.indexes;
        if unchanged {
            return Ok(self.clone());
        }

        for migration in &submitted {
            migration::apply_migration(&mut entity_types, &mut component_types, migration)?;
        }

        let mut migrations = old.migrations.clone();
        for migration in submitted.into_iter().rev() {
            migrations.insert(0, migration);
        }

        let mut merged = SchemaSpecificationWithMigrations {
            schema_kind: old.schema_kind,
            version: old.version + 1,
            entity_types,
            component_types,
            patterns,
            indexes,
            migrations,
        };
        prune_unused_patterns_and_indexes(&mut merged);

        debug!(
            from_version = old.version,
            to_version = merged.version,
            "accepted schema update"
        );
        Schema::create_and_validate(merged)
    }
}

fn merge_by_name<T: Clone>(
    existing: &[T],
    updates: &[T],
    name: impl Fn(&T) -> &String,
) -> Vec<T> {
    let mut merged: Vec<T> = existing.to_vec();
    for update in updates {
        match merged
            .iter()
            .position(|candidate| name(candidate) == name(update))
        {
            Some(position) => merged[position] = update.clone(),
            None => merged.push(update.clone()),
        }
    }
    merged
}

fn merge_types(
    existing: &[TypeSpecification],
    updates: &[TypeSpecificationUpdate],
) -> Result<Vec<TypeSpecification>> {
    let mut merged: Vec<TypeSpecification> = existing.to_vec();
    for update in updates {
        match merged
            .iter()
            .position(|candidate| candidate.name == update.name)
        {
            Some(position) => merged[position] = merge_existing_type(&merged[position], update)?,
            None => merged.push(new_type(update)?),
        }
    }
    Ok(merged)
}

fn merge_existing_type(
    existing: &TypeSpecification,
    update: &TypeSpecificationUpdate,
) -> Result<TypeSpecification> {
    if let Some(admin_only) = update.admin_only {
        if admin_only != existing.admin_only {
            return Err(DossierError::bad_request(format!(
                "{}: Can't change the value of adminOnly. Requested {admin_only} but is {}",
                existing.name, existing.admin_only
            )));
        }
    }

    let mut fields: Vec<FieldSpecification> = Vec::with_capacity(existing.fields.len());
    for field in &existing.fields {
        match update
            .fields
            .iter()
            .find(|candidate| candidate.name() == field.name())
        {
            Some(field_update) => {
                fields.push(merge_existing_field(&existing.name, field, field_update)?);
            }
            None => fields.push(field.clone()),
        }
    }
    for field_update in &update.fields {
        if existing.get_field(field_update.name()).is_none() {
            fields.push(new_field(field_update));
        }
    }

    Ok(TypeSpecification {
        name: existing.name.clone(),
        admin_only: existing.admin_only,
        auth_key_pattern: update
            .auth_key_pattern
            .clone()
            .or_else(|| existing.auth_key_pattern.clone()),
        name_field: update
            .name_field
            .clone()
            .or_else(|| existing.name_field.clone()),
        publishable: update.publishable.unwrap_or(existing.publishable),
        fields,
    })
}

fn new_type(update: &TypeSpecificationUpdate) -> Result<TypeSpecification> {
    Ok(TypeSpecification {
        name: update.name.clone(),
        admin_only: update.admin_only.unwrap_or(false),
        auth_key_pattern: update.auth_key_pattern.clone(),
        name_field: update.name_field.clone(),
        publishable: update.publishable.unwrap_or(true),
        fields: update.fields.iter().map(new_field).collect(),
    })
}

fn merge_existing_field(
    type_name: &str,
    existing: &FieldSpecification,
    update: &FieldSpecificationUpdate,
) -> Result<FieldSpecification> {
    let location = format!("{type_name}.{}", existing.name());

    if update.type_name() != existing.type_name() {
        return Err(DossierError::bad_request(format!(
            "{location}: Can't change type of field. Requested {} but is {}",
            update.type_name(),
            existing.type_name()
        )));
    }
    let shared_update = update.shared();
    if let Some(list) = shared_update.list {
        if list != existing.is_list() {
            return Err(DossierError::bad_request(format!(
                "{location}: Can't change the value of list. Requested {list} but is {}",
                existing.is_list()
            )));
        }
    }
    if let Some(admin_only) = shared_update.admin_only {
        if admin_only != existing.admin_only() {
            return Err(DossierError::bad_request(format!(
                "{location}: Can't change the value of adminOnly. Requested {admin_only} but is {}",
                existing.admin_only()
            )));
        }
    }

    let shared = SharedFieldSpecification {
        name: existing.name().to_owned(),
        list: existing.is_list(),
        required: shared_update.required.unwrap_or_else(|| existing.required()),
        admin_only: existing.admin_only(),
    };

    let merged = match (existing, update) {
        (FieldSpecification::Boolean(_), FieldSpecificationUpdate::Boolean(_)) => {
            FieldSpecification::Boolean(BooleanFieldSpecification { shared })
        }
        (
            FieldSpecification::String(existing_field),
            FieldSpecificationUpdate::String(field_update),
        ) => {
            if let Some(index) = &field_update.index {
                if existing_field.index.as_ref() != Some(index) {
                    return Err(DossierError::bad_request(format!(
                        "{location}: Can't change the value of index. Requested {index} but is {}",
                        existing_field.index.as_deref().unwrap_or("null")
                    )));
                }
            }
            FieldSpecification::String(StringFieldSpecification {
                shared,
                multiline: field_update.multiline.unwrap_or(existing_field.multiline),
                index: existing_field.index.clone(),
                match_pattern: field_update
                    .match_pattern
                    .clone()
                    .or_else(|| existing_field.match_pattern.clone()),
                values: field_update
                    .values
                    .clone()
                    .unwrap_or_else(|| existing_field.values.clone()),
            })
        }
        (
            FieldSpecification::Number(existing_field),
            FieldSpecificationUpdate::Number(field_update),
        ) => FieldSpecification::Number(NumberFieldSpecification {
            shared,
            integer: field_update.integer.unwrap_or(existing_field.integer),
        }),
        (FieldSpecification::Location(_), FieldSpecificationUpdate::Location(_)) => {
            FieldSpecification::Location(LocationFieldSpecification { shared })
        }
        (
            FieldSpecification::Reference(existing_field),
            FieldSpecificationUpdate::Reference(field_update),
        ) => FieldSpecification::Reference(ReferenceFieldSpecification {
            shared,
            entity_types: field_update
                .entity_types
                .clone()
                .unwrap_or_else(|| existing_field.entity_types.clone()),
        }),
        (
            FieldSpecification::Component(existing_field),
            FieldSpecificationUpdate::Component(field_update),
        ) => FieldSpecification::Component(ComponentFieldSpecification {
            shared,
            component_types: field_update
                .component_types
                .clone()
                .unwrap_or_else(|| existing_field.component_types.clone()),
        }),
        (
            FieldSpecification::RichText(existing_field),
            FieldSpecificationUpdate::RichText(field_update),
        ) => FieldSpecification::RichText(RichTextFieldSpecification {
            shared,
            entity_types: field_update
                .entity_types
                .clone()
                .unwrap_or_else(|| existing_field.entity_types.clone()),
            link_entity_types: field_update
                .link_entity_types
                .clone()
                .unwrap_or_else(|| existing_field.link_entity_types.clone()),
            component_types: field_update
                .component_types
                .clone()
                .unwrap_or_else(|| existing_field.component_types.clone()),
            rich_text_nodes: field_update
                .rich_text_nodes
                .clone()
                .unwrap_or_else(|| existing_field.rich_text_nodes.clone()),
        }),
        // Kind mismatch is rejected above before reaching this match.
        _ => {
            return Err(DossierError::Generic(format!(
                "field kind mismatch slipped through for {location}"
            )));
        }
    };
    Ok(merged)
}

fn new_field(update: &FieldSpecificationUpdate) -> FieldSpecification {
    let shared_update = update.shared();
    let shared = SharedFieldSpecification {
        name: shared_update.name.clone(),
        list: shared_update.list.unwrap_or(false),
        required: shared_update.required.unwrap_or(false),
        admin_only: shared_update.admin_only.unwrap_or(false),
    };
    match update {
        FieldSpecificationUpdate::Boolean(_) => {
            FieldSpecification::Boolean(BooleanFieldSpecification { shared })
        }
        FieldSpecificationUpdate::String(field_update) => {
            FieldSpecification::String(StringFieldSpecification {
                shared,
                multiline: field_update.multiline.unwrap_or(false),
                index: field_update.index.clone(),
                match_pattern: field_update.match_pattern.clone(),
                values: field_update.values.clone().unwrap_or_default(),
            })
        }
        FieldSpecificationUpdate::Number(field_update) => {
            FieldSpecification::Number(NumberFieldSpecification {
                shared,
                integer: field_update.integer.unwrap_or(false),
            })
        }
        FieldSpecificationUpdate::Location(_) => {
            FieldSpecification::Location(LocationFieldSpecification { shared })
        }
        FieldSpecificationUpdate::Reference(field_update) => {
            FieldSpecification::Reference(ReferenceFieldSpecification {
                shared,
                entity_types: field_update.entity_types.clone().unwrap_or_default(),
            })
        }
        FieldSpecificationUpdate::Component(field_update) => {
            FieldSpecification::Component(ComponentFieldSpecification {
                shared,
                component_types: field_update.component_types.clone().unwrap_or_default(),
            })
        }
        FieldSpecificationUpdate::RichText(field_update) => {
            FieldSpecification::RichText(RichTextFieldSpecification {
                shared,
                entity_types: field_update.entity_types.clone().unwrap_or_default(),
                link_entity_types: field_update.link_entity_types.clone().unwrap_or_default(),
                component_types: field_update.component_types.clone().unwrap_or_default(),
                rich_text_nodes: field_update.rich_text_nodes.clone().unwrap_or_default(),
            })
        }
    }
}

/// Drops patterns and indexes no longer referenced by any type or field.
fn prune_unused_patterns_and_indexes(spec: &mut SchemaSpecificationWithMigrations) {
    let mut used_patterns: Vec<String> = Vec::new();
    let mut used_indexes: Vec<String> = Vec::new();
    for type_spec in spec.entity_types.iter().chain(spec.component_types.iter()) {
        if let Some(pattern) = &type_spec.auth_key_pattern {
            used_patterns.push(pattern.clone());
        }
        for field in &type_spec.fields {
            if let FieldSpecification::String(string_field) = field {
                if let Some(pattern) = &string_field.match_pattern {
                    used_patterns.push(pattern.clone());
                }
                if let Some(index) = &string_field.index {
                    used_indexes.push(index.clone());
                }
            }
        }
    }
    dedup_in_place(&mut used_patterns);
    dedup_in_place(&mut used_indexes);
    spec.patterns
        .retain(|pattern| used_patterns.contains(&pattern.name));
    spec.indexes.retain(|index| used_indexes.contains(&index.name));
}
