#![forbid(unsafe_code)]

//! Referential-integrity and consistency validation for schema
//! specifications.
//!
//! Checks run in dependency order: name uniqueness first, then every
//! by-name reference (patterns, indexes, type references), then
//! kind-specific constraints. Validation never mutates; normalization
//! (dedup of name lists) happens before this pass.

use regex::Regex;

use crate::error::{DossierError, Result};
use crate::schema::spec::{
    FieldSpecification, SchemaSpecificationWithMigrations, TypeSpecification,
    REQUIRED_RICH_TEXT_NODES,
};

pub(crate) fn validate_spec(spec: &SchemaSpecificationWithMigrations) -> Result<()> {
    validate_unique_names(spec)?;
    validate_patterns_compile(spec)?;
    for type_spec in spec.entity_types.iter().chain(spec.component_types.iter()) {
        validate_type(spec, type_spec)?;
    }
    validate_migration_log(spec)
}

fn validate_unique_names(spec: &SchemaSpecificationWithMigrations) -> Result<()> {
    let mut type_names: Vec<&str> = Vec::new();
    for type_spec in spec.entity_types.iter().chain(spec.component_types.iter()) {
        if type_names.contains(&type_spec.name.as_str()) {
            return Err(DossierError::bad_request(format!(
                "Duplicate type name: {}",
                type_spec.name
            )));
        }
        type_names.push(&type_spec.name);
    }

    let mut pattern_names: Vec<&str> = Vec::new();
    for pattern in &spec.patterns {
        if pattern_names.contains(&pattern.name.as_str()) {
            return Err(DossierError::bad_request(format!(
                "Duplicate pattern name: {}",
                pattern.name
            )));
        }
        pattern_names.push(&pattern.name);
    }

    let mut index_names: Vec<&str> = Vec::new();
    for index in &spec.indexes {
        if index_names.contains(&index.name.as_str()) {
            return Err(DossierError::bad_request(format!(
                "Duplicate index name: {}",
                index.name
            )));
        }
        index_names.push(&index.name);
    }
    Ok(())
}

fn validate_patterns_compile(spec: &SchemaSpecificationWithMigrations) -> Result<()> {
    for pattern in &spec.patterns {
        Regex::new(&pattern.pattern).map_err(|_| {
            DossierError::bad_request(format!("Pattern {} is not a valid regex", pattern.name))
        })?;
    }
    Ok(())
}

fn validate_type(
    spec: &SchemaSpecificationWithMigrations,
    type_spec: &TypeSpecification,
) -> Result<()> {
    let mut field_names: Vec<&str> = Vec::new();
    for field in &type_spec.fields {
        if field_names.contains(&field.name()) {
            return Err(DossierError::bad_request(format!(
                "{}: Duplicate field name: {}",
                type_spec.name,
                field.name()
            )));
        }
        field_names.push(field.name());
    }

    if let Some(pattern_name) = &type_spec.auth_key_pattern {
        if spec.get_pattern(pattern_name).is_none() {
            return Err(DossierError::bad_request(format!(
                "{}: Unknown authKeyPattern ({pattern_name})",
                type_spec.name
            )));
        }
    }

    if let Some(name_field) = &type_spec.name_field {
        match type_spec.get_field(name_field) {
            Some(FieldSpecification::String(string_field)) if !string_field.shared.list => {}
            _ => {
                return Err(DossierError::bad_request(format!(
                    "{}: Found no single string field matching nameField ({name_field})",
                    type_spec.name
                )));
            }
        }
    }

    for field in &type_spec.fields {
        validate_field(spec, type_spec, field)?;
    }
    Ok(())
}

fn validate_field(
    spec: &SchemaSpecificationWithMigrations,
    type_spec: &TypeSpecification,
    field: &FieldSpecification,
) -> Result<()> {
    let location = || format!("{}.{}", type_spec.name, field.name());

    match field {
        FieldSpecification::String(string_field) => {
            if let Some(pattern_name) = &string_field.match_pattern {
                if spec.get_pattern(pattern_name).is_none() {
                    return Err(DossierError::bad_request(format!(
                        "{}: Unknown matchPattern ({pattern_name})",
                        location()
                    )));
                }
            }
            if let Some(index_name) = &string_field.index {
                if spec.get_index(index_name).is_none() {
                    return Err(DossierError::bad_request(format!(
                        "{}: Unknown index ({index_name})",
                        location()
                    )));
                }
            }
        }
        FieldSpecification::Reference(reference) => {
            validate_entity_type_references(spec, &location, &reference.entity_types)?;
        }
        FieldSpecification::Component(component) => {
            validate_component_type_references(spec, &location, &component.component_types)?;
        }
        FieldSpecification::RichText(rich_text) => {
            validate_entity_type_references(spec, &location, &rich_text.entity_types)?;
            validate_entity_type_references(spec, &location, &rich_text.link_entity_types)?;
            validate_component_type_references(spec, &location, &rich_text.component_types)?;
            if !rich_text.rich_text_nodes.is_empty() {
                for required in REQUIRED_RICH_TEXT_NODES {
                    if !rich_text
                        .rich_text_nodes
                        .iter()
                        .any(|node| node == required)
                    {
                        return Err(DossierError::bad_request(format!(
                            "{}: richTextNodes must include {required}",
                            location()
                        )));
                    }
                }
            }
        }
        FieldSpecification::Boolean(_)
        | FieldSpecification::Number(_)
        | FieldSpecification::Location(_) => {}
    }
    Ok(())
}

fn validate_entity_type_references(
    spec: &SchemaSpecificationWithMigrations,
    location: &dyn Fn() -> String,
    names: &[String],
) -> Result<()> {
    for name in names {
        if !spec
            .entity_types
            .iter()
            .any(|type_spec| &type_spec.name == name)
        {
            return Err(DossierError::bad_request(format!(
                "{}: Referenced entity type {name} doesn't exist",
                location()
            )));
        }
    }
    Ok(())
}

fn validate_component_type_references(
    spec: &SchemaSpecificationWithMigrations,
    location: &dyn Fn() -> String,
    names: &[String],
) -> Result<()> {
    for name in names {
        if !spec
            .component_types
            .iter()
            .any(|type_spec| &type_spec.name == name)
        {
            return Err(DossierError::bad_request(format!(
                "{}: Referenced component type {name} doesn't exist",
                location()
            )));
        }
    }
    Ok(())
}

/// The stored migration log must be newest-first with unique versions, and
/// no entry may claim a version above the schema itself.
fn validate_migration_log(spec: &SchemaSpecificationWithMigrations) -> Result<()> {
    let mut previous: Option<u32> = None;
    for migration in &spec.migrations {
        if migration.version > spec.version {
            return Err(DossierError::bad_request(format!(
                "Migration {} is newer than the schema version {}",
                migration.version, spec.version
            )));
        }
        if let Some(previous) = previous {
            if migration.version >= previous {
                return Err(DossierError::bad_request(
                    "Migration versions must be unique and descending",
                ));
            }
        }
        previous = Some(migration.version);
    }
    Ok(())
}
