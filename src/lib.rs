//! Dossier core: the query-generation and schema-migration engine behind
//! a headless content platform.
//!
//! Two subsystems live here. The query side translates abstract entity
//! queries (filters, relay paging, full text, geo bounding boxes,
//! reference-graph links) into dialect-specific parameterized SQL for two
//! storage backends. The schema side validates schema specifications,
//! merges partial updates with carry-forward semantics, and maintains the
//! append-only structural migration log consumed for lazy data migration.
//!
//! Every operation is a pure, synchronous transformation: no I/O, no
//! shared mutable state, safe to call concurrently without locking.

#![forbid(unsafe_code)]

pub mod error;
pub mod query;
pub mod schema;

pub use error::{DossierError, Result};
pub use query::{
    resolve_paging, sample_admin_entities_query, sample_published_entities_query,
    search_admin_entities_query, search_published_entities_query,
    total_admin_entities_count_query, total_published_entities_count_query, CursorValue,
    EntityQuery, Paging, PagingInclusivity, ResolvedAuthKey, ResolvedPaging, SearchQuery,
    SqlDialect, SqlStatement,
};
pub use schema::{Schema, SchemaSpecificationUpdate, SchemaSpecificationWithMigrations};
