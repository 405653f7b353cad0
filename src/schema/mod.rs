#![forbid(unsafe_code)]

//! Schema specification, validation, update/merge, and the structural
//! migration log.
//!
//! The entry points are [`Schema::create_and_validate`] for loading a
//! persisted specification and [`Schema::update_and_validate`] for
//! applying a partial update. Both are pure: they either return a fresh
//! immutable [`Schema`] or an error, never a partially applied state.

/// Structural migration log types and application rules.
pub mod migration;

/// Published-schema projection.
mod publish;

/// Specification types and the validated [`Schema`] wrapper.
pub mod spec;

/// Update payload types and the merge engine.
pub mod update;

mod validate;

pub use migration::{MigrationAction, SchemaVersionMigration, TypeTarget};
pub use spec::{
    FieldSpecification, Schema, SchemaIndexSpecification, SchemaIndexType, SchemaKind,
    SchemaPatternSpecification, SchemaSpecification, SchemaSpecificationWithMigrations,
    TypeSpecification, REQUIRED_RICH_TEXT_NODES,
};
pub use update::{FieldSpecificationUpdate, SchemaSpecificationUpdate, TypeSpecificationUpdate};
