#![forbid(unsafe_code)]

//! Entity query generation: abstract queries, relay-style paging, and
//! dialect-specific parameterized SQL.
//!
//! Everything here is a pure transformation. The generated
//! [`SqlStatement`](sql::SqlStatement) carries no side effects until the
//! caller's storage adapter executes it.

/// SQL dialect strategy and parameter values.
pub mod dialect;

/// Abstract entity query and paging wire shapes.
pub mod entity_query;

/// Search, sample, and total-count statement generators.
pub mod generator;

/// Paging resolution and opaque cursors.
pub mod paging;

/// Parameterized-SQL accumulator.
pub mod sql;

pub use dialect::{QueryValue, SqlDialect};
pub use entity_query::{
    BoundingBox, EntityLink, EntityQuery, EntityQueryOrder, EntityStatus, Paging, ResolvedAuthKey,
};
pub use generator::{
    sample_admin_entities_query, sample_published_entities_query, search_admin_entities_query,
    search_published_entities_query, total_admin_entities_count_query,
    total_published_entities_count_query, SearchQuery, SortColumn,
};
pub use paging::{resolve_paging, CursorValue, PagingInclusivity, ResolvedPaging, DEFAULT_PAGE_SIZE};
pub use sql::SqlStatement;
