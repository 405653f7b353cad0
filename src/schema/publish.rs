#![forbid(unsafe_code)]

//! Published-schema projection.
//!
//! The published read surface sees a reduced schema: admin-only types and
//! fields are dropped, as are entity types that can never be published.
//! References to dropped types are filtered out of the remaining fields so
//! the projection is self-consistent.

use crate::schema::spec::{
    FieldSpecification, Schema, SchemaKind, SchemaSpecification, TypeSpecification,
};

impl Schema {
    /// Derives the published view of this schema. The migration log is an
    /// admin concern and is not part of the projection.
    pub fn to_published(&self) -> SchemaSpecification {
        let entity_types: Vec<TypeSpecification> = self
            .spec
            .entity_types
            .iter()
            .filter(|type_spec| !type_spec.admin_only && type_spec.publishable)
            .map(project_type)
            .collect();
        let component_types: Vec<TypeSpecification> = self
            .spec
            .component_types
            .iter()
            .filter(|type_spec| !type_spec.admin_only)
            .map(project_type)
            .collect();

        let entity_names: Vec<String> = entity_types
            .iter()
            .map(|type_spec| type_spec.name.clone())
            .collect();
        let component_names: Vec<String> = component_types
            .iter()
            .map(|type_spec| type_spec.name.clone())
            .collect();

        let mut published = SchemaSpecification {
            schema_kind: SchemaKind::Published,
            version: self.spec.version,
            entity_types,
            component_types,
            patterns: self.spec.patterns.clone(),
            indexes: self.spec.indexes.clone(),
        };
        for type_spec in published
            .entity_types
            .iter_mut()
            .chain(published.component_types.iter_mut())
        {
            for field in &mut type_spec.fields {
                filter_type_references(field, &entity_names, &component_names);
            }
        }
        prune(&mut published);
        published
    }
}

fn project_type(type_spec: &TypeSpecification) -> TypeSpecification {
    let fields: Vec<FieldSpecification> = type_spec
        .fields
        .iter()
        .filter(|field| !field.admin_only())
        .cloned()
        .collect();
    let name_field = type_spec
        .name_field
        .clone()
        .filter(|name| fields.iter().any(|field| field.name() == name));
    TypeSpecification {
        name: type_spec.name.clone(),
        admin_only: false,
        auth_key_pattern: type_spec.auth_key_pattern.clone(),
        name_field,
        publishable: type_spec.publishable,
        fields,
    }
}

fn filter_type_references(
    field: &mut FieldSpecification,
    entity_names: &[String],
    component_names: &[String],
) {
    match field {
        FieldSpecification::Reference(reference) => {
            reference.entity_types.retain(|name| entity_names.contains(name));
        }
        FieldSpecification::Component(component) => {
            component
                .component_types
                .retain(|name| component_names.contains(name));
        }
        FieldSpecification::RichText(rich_text) => {
            rich_text.entity_types.retain(|name| entity_names.contains(name));
            rich_text
                .link_entity_types
                .retain(|name| entity_names.contains(name));
            rich_text
                .component_types
                .retain(|name| component_names.contains(name));
        }
        FieldSpecification::Boolean(_)
        | FieldSpecification::String(_)
        | FieldSpecification::Number(_)
        | FieldSpecification::Location(_) => {}
    }
}

fn prune(spec: &mut SchemaSpecification) {
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
    spec.patterns
        .retain(|pattern| used_patterns.contains(&pattern.name));
    spec.indexes.retain(|index| used_indexes.contains(&index.name));
}
