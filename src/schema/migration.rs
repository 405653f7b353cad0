#![forbid(unsafe_code)]

//! Structural schema migrations: an ordered, append-only log of field and
//! type renames/deletes, scoped to schema versions.
//!
//! The log is stored newest-first and only mutated as a side effect of
//! [`Schema::update_and_validate`](crate::schema::Schema::update_and_validate).
//! Each recorded version is frozen forever; only strictly new versions may
//! be appended. The entries are consumed later for lazy data migration of
//! stored entities.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DossierError, Result};
use crate::schema::spec::TypeSpecification;

/// Names the type a migration action applies to, in either namespace.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TypeTarget {
    /// An entity type.
    #[serde(rename = "entityType")]
    Entity(String),
    /// A component type.
    #[serde(rename = "componentType")]
    Component(String),
}

impl TypeTarget {
    /// The targeted type name.
    pub fn type_name(&self) -> &str {
        match self {
            TypeTarget::Entity(name) | TypeTarget::Component(name) => name,
        }
    }

    fn with_name(&self, name: String) -> Self {
        match self {
            TypeTarget::Entity(_) => TypeTarget::Entity(name),
            TypeTarget::Component(_) => TypeTarget::Component(name),
        }
    }
}

/// A single structural schema-evolution instruction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum MigrationAction {
    /// Removes a field from a type.
    #[serde(rename = "deleteField", rename_all = "camelCase")]
    DeleteField {
        /// The type owning the field.
        #[serde(flatten)]
        target: TypeTarget,
        /// Name of the field to remove.
        field: String,
    },
    /// Renames a field in place, preserving position and attributes.
    #[serde(rename = "renameField", rename_all = "camelCase")]
    RenameField {
        /// The type owning the field.
        #[serde(flatten)]
        target: TypeTarget,
        /// Current field name.
        field: String,
        /// New field name.
        new_name: String,
    },
    /// Removes a type and every reference to it.
    #[serde(rename = "deleteType", rename_all = "camelCase")]
    DeleteType {
        /// The type to remove.
        #[serde(flatten)]
        target: TypeTarget,
    },
    /// Renames a type, re-pointing every reference to it.
    #[serde(rename = "renameType", rename_all = "camelCase")]
    RenameType {
        /// The type to rename.
        #[serde(flatten)]
        target: TypeTarget,
        /// New type name.
        new_name: String,
    },
}

impl MigrationAction {
    /// Wire name of the action (`"deleteField"`, ...).
    pub fn action_name(&self) -> &'static str {
        match self {
            MigrationAction::DeleteField { .. } => "deleteField",
            MigrationAction::RenameField { .. } => "renameField",
            MigrationAction::DeleteType { .. } => "deleteType",
            MigrationAction::RenameType { .. } => "renameType",
        }
    }

    /// The type the action applies to.
    pub fn target(&self) -> &TypeTarget {
        match self {
            MigrationAction::DeleteField { target, .. }
            | MigrationAction::RenameField { target, .. }
            | MigrationAction::DeleteType { target }
            | MigrationAction::RenameType { target, .. } => target,
        }
    }

    /// `Type` or `Type.field` subject path, used in error messages.
    pub fn subject(&self) -> String {
        match self {
            MigrationAction::DeleteField { target, field }
            | MigrationAction::RenameField { target, field, .. } => {
                format!("{}.{field}", target.type_name())
            }
            MigrationAction::DeleteType { target } | MigrationAction::RenameType { target, .. } => {
                target.type_name().to_owned()
            }
        }
    }
}

/// Migration actions recorded against one schema version.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SchemaVersionMigration {
    /// The schema version these actions were accepted with. Must equal the
    /// previous schema version plus one at submission time.
    pub version: u32,
    /// Actions applied in order.
    pub actions: Vec<MigrationAction>,
}

/// Validates newly submitted migration entries against the stored log.
///
/// Entries with no actions have already been dropped by the caller. Checks
/// run in order: duplicates within the submission, resubmission of a frozen
/// version, then the monotonic-version rule.
pub(crate) fn validate_new_migrations(
    current_version: u32,
    stored: &[SchemaVersionMigration],
    submitted: &[SchemaVersionMigration],
) -> Result<()> {
    for (position, migration) in submitted.iter().enumerate() {
        if submitted[..position]
            .iter()
            .any(|other| other.version == migration.version)
        {
            return Err(DossierError::bad_request(format!(
                "Duplicate migrations for version {}",
                migration.version
            )));
        }
        if stored.iter().any(|other| other.version == migration.version) {
            return Err(DossierError::bad_request(format!(
                "Migration {} is already defined",
                migration.version
            )));
        }
        let expected = current_version + 1;
        if migration.version != expected {
            return Err(DossierError::bad_request(format!(
                "New migration {} must be the same as the schema new version {expected}",
                migration.version
            )));
        }
    }
    Ok(())
}

/// Applies one migration's actions to the merged type lists, in submission
/// order. Every action must resolve against the spec as it stands when the
/// action is evaluated.
pub(crate) fn apply_migration(
    entity_types: &mut Vec<TypeSpecification>,
    component_types: &mut Vec<TypeSpecification>,
    migration: &SchemaVersionMigration,
) -> Result<()> {
    for action in &migration.actions {
        apply_action(entity_types, component_types, action)?;
        debug!(
            version = migration.version,
            action = action.action_name(),
            subject = %action.subject(),
            "applied schema migration action"
        );
    }
    Ok(())
}

fn apply_action(
    entity_types: &mut Vec<TypeSpecification>,
    component_types: &mut Vec<TypeSpecification>,
    action: &MigrationAction,
) -> Result<()> {
    let target = action.target();
    let namespace = match target {
        TypeTarget::Entity(_) => &mut *entity_types,
        TypeTarget::Component(_) => &mut *component_types,
    };
    let type_index = namespace
        .iter()
        .position(|type_spec| type_spec.name == target.type_name())
        .ok_or_else(|| {
            DossierError::bad_request(format!(
                "Type for migration {} {} does not exist",
                action.action_name(),
                action.subject()
            ))
        })?;

    match action {
        MigrationAction::DeleteField { field, .. } => {
            let type_spec = &mut namespace[type_index];
            let field_index = field_position(type_spec, field).ok_or_else(|| {
                field_missing_error(action)
            })?;
            type_spec.fields.remove(field_index);
            if type_spec.name_field.as_deref() == Some(field.as_str()) {
                type_spec.name_field = None;
            }
        }
        MigrationAction::RenameField {
            field, new_name, ..
        } => {
            let type_spec = &mut namespace[type_index];
            let field_index = field_position(type_spec, field).ok_or_else(|| {
                field_missing_error(action)
            })?;
            type_spec.fields[field_index].shared_mut().name = new_name.clone();
            if type_spec.name_field.as_deref() == Some(field.as_str()) {
                type_spec.name_field = Some(new_name.clone());
            }
        }
        MigrationAction::DeleteType { .. } => {
            namespace.remove(type_index);
            drop_type_references(entity_types, component_types, target);
        }
        MigrationAction::RenameType { new_name, .. } => {
            namespace[type_index].name = new_name.clone();
            rename_type_references(
                entity_types,
                component_types,
                target,
                &target.with_name(new_name.clone()),
            );
        }
    }
    Ok(())
}

fn field_position(type_spec: &TypeSpecification, field: &str) -> Option<usize> {
    type_spec
        .fields
        .iter()
        .position(|candidate| candidate.name() == field)
}

fn field_missing_error(action: &MigrationAction) -> DossierError {
    DossierError::bad_request(format!(
        "Field for migration {} {} does not exist",
        action.action_name(),
        action.subject()
    ))
}

fn drop_type_references(
    entity_types: &mut [TypeSpecification],
    component_types: &mut [TypeSpecification],
    target: &TypeTarget,
) {
    visit_reference_lists(entity_types, component_types, target, &mut |list| {
        list.retain(|name| name != target.type_name());
    });
}

fn rename_type_references(
    entity_types: &mut [TypeSpecification],
    component_types: &mut [TypeSpecification],
    old: &TypeTarget,
    new: &TypeTarget,
) {
    visit_reference_lists(entity_types, component_types, old, &mut |list| {
        for name in list.iter_mut() {
            if name == old.type_name() {
                *name = new.type_name().to_owned();
            }
        }
    });
}

/// Runs `visit` over every field attribute that can name a type in the
/// target's namespace: `entityTypes`/`linkEntityTypes` for entity targets,
/// `componentTypes` for component targets.
fn visit_reference_lists(
    entity_types: &mut [TypeSpecification],
    component_types: &mut [TypeSpecification],
    target: &TypeTarget,
    visit: &mut dyn FnMut(&mut Vec<String>),
) {
    use crate::schema::spec::FieldSpecification;

    for type_spec in entity_types.iter_mut().chain(component_types.iter_mut()) {
        for field in &mut type_spec.fields {
            match (field, target) {
                (FieldSpecification::Reference(reference), TypeTarget::Entity(_)) => {
                    visit(&mut reference.entity_types);
                }
                (FieldSpecification::Component(component), TypeTarget::Component(_)) => {
                    visit(&mut component.component_types);
                }
                (FieldSpecification::RichText(rich_text), TypeTarget::Entity(_)) => {
                    visit(&mut rich_text.entity_types);
                    visit(&mut rich_text.link_entity_types);
                }
                (FieldSpecification::RichText(rich_text), TypeTarget::Component(_)) => {
                    visit(&mut rich_text.component_types);
                }
                _ => {}
            }
        }
    }
}
