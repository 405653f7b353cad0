#![forbid(unsafe_code)]

//! Entity query generation.
//!
//! Pure functions translating an abstract [`EntityQuery`] plus resolved
//! paging and auth keys into dialect-specific parameterized SQL, in three
//! purposes (search, sample, total count) and two lifecycle flavors
//! (admin/draft and published).
//!
//! Filter fragments are ANDed in a fixed order because it determines the
//! positional parameter numbering: auth key is always parameter 1,
//! followed by entity type, status, links-to/links-from, bounding box,
//! full text, paging bounds, and finally the LIMIT count. The generated
//! text is deterministic for identical logical input.

use crate::error::{DossierError, Result};
use crate::query::dialect::{QueryValue, SqlDialect};
use crate::query::entity_query::{EntityQuery, EntityQueryOrder, ResolvedAuthKey};
use crate::query::paging::{CursorValue, ResolvedPaging};
use crate::query::sql::{SqlBuilder, SqlStatement};
use crate::schema::Schema;

/// Which lifecycle view a query reads.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum EntityFlavor {
    Admin,
    Published,
}

impl EntityFlavor {
    /// The `entities` column pointing at the effective version row.
    fn version_pointer(self) -> &'static str {
        match self {
            EntityFlavor::Admin => "latest_entity_versions_id",
            EntityFlavor::Published => "published_entity_versions_id",
        }
    }

    fn fts_column(self) -> &'static str {
        match self {
            EntityFlavor::Admin => "latest_fts",
            EntityFlavor::Published => "published_fts",
        }
    }

    fn fts_table(self) -> &'static str {
        match self {
            EntityFlavor::Admin => "entities_latest_fts",
            EntityFlavor::Published => "entities_published_fts",
        }
    }
}

/// Physical sort column backing an [`EntityQueryOrder`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortColumn {
    /// `e.id` — assigned in creation order.
    Id,
    /// `e.updated_at`.
    UpdatedAt,
    /// `e.name`.
    Name,
}

impl SortColumn {
    /// Qualified column name in the generated SQL.
    pub fn column_name(self) -> &'static str {
        match self {
            SortColumn::Id => "e.id",
            SortColumn::UpdatedAt => "e.updated_at",
            SortColumn::Name => "e.name",
        }
    }

    /// The cursor type tag this column's values carry.
    pub fn cursor_type_name(self) -> &'static str {
        match self {
            SortColumn::Id => "int",
            SortColumn::UpdatedAt | SortColumn::Name => "str",
        }
    }
}

fn sort_column(order: EntityQueryOrder) -> SortColumn {
    match order {
        EntityQueryOrder::CreatedAt => SortColumn::Id,
        EntityQueryOrder::UpdatedAt => SortColumn::UpdatedAt,
        EntityQueryOrder::Name => SortColumn::Name,
    }
}

/// A generated search statement plus the sort column cursors are minted
/// from. Callers extract the sort-key value from each result row and use
/// [`SearchQuery::encode_cursor`] to build edge cursors and `PageInfo`.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchQuery {
    /// The parameterized statement.
    pub sql: SqlStatement,
    /// Column whose row values back the opaque cursors.
    pub cursor_column: SortColumn,
}

impl SearchQuery {
    /// Encodes a row's sort-key value as an opaque cursor, rejecting
    /// values of the wrong type for the query's sort column.
    pub fn encode_cursor(&self, value: &CursorValue) -> Result<String> {
        check_cursor_type(self.cursor_column, value)?;
        value.encode()
    }
}

fn check_cursor_type(column: SortColumn, value: &CursorValue) -> Result<()> {
    if value.type_name() != column.cursor_type_name() {
        return Err(DossierError::bad_request(format!(
            "Paging cursor of wrong type, expected {}, got {}",
            column.cursor_type_name(),
            value.type_name()
        )));
    }
    Ok(())
}

/// Generates the admin (latest-version) search statement.
pub fn search_admin_entities_query(
    dialect: SqlDialect,
    schema: &Schema,
    query: Option<&EntityQuery>,
    paging: &ResolvedPaging,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SearchQuery> {
    search_entities_query(dialect, schema, EntityFlavor::Admin, query, paging, auth_keys)
}

/// Generates the published search statement.
pub fn search_published_entities_query(
    dialect: SqlDialect,
    schema: &Schema,
    query: Option<&EntityQuery>,
    paging: &ResolvedPaging,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SearchQuery> {
    search_entities_query(
        dialect,
        schema,
        EntityFlavor::Published,
        query,
        paging,
        auth_keys,
    )
}

/// Generates the admin random-sample statement. Sampling ignores cursors
/// and the regular sort orders; it is keyed off the UUID column so
/// repeated sampling with the same offset is reproducible independent of
/// schema or insertion order.
pub fn sample_admin_entities_query(
    dialect: SqlDialect,
    schema: &Schema,
    query: Option<&EntityQuery>,
    offset: u32,
    limit: u32,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SqlStatement> {
    sample_entities_query(
        dialect,
        schema,
        EntityFlavor::Admin,
        query,
        offset,
        limit,
        auth_keys,
    )
}

/// Generates the published random-sample statement.
pub fn sample_published_entities_query(
    dialect: SqlDialect,
    schema: &Schema,
    query: Option<&EntityQuery>,
    offset: u32,
    limit: u32,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SqlStatement> {
    sample_entities_query(
        dialect,
        schema,
        EntityFlavor::Published,
        query,
        offset,
        limit,
        auth_keys,
    )
}

/// Generates the admin total-count statement: the same filters as search,
/// without ordering or paging.
pub fn total_admin_entities_count_query(
    dialect: SqlDialect,
    schema: &Schema,
    query: Option<&EntityQuery>,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SqlStatement> {
    total_entities_count_query(dialect, schema, EntityFlavor::Admin, query, auth_keys)
}

/// Generates the published total-count statement.
pub fn total_published_entities_count_query(
    dialect: SqlDialect,
    schema: &Schema,
    query: Option<&EntityQuery>,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SqlStatement> {
    total_entities_count_query(dialect, schema, EntityFlavor::Published, query, auth_keys)
}

fn search_entities_query(
    dialect: SqlDialect,
    schema: &Schema,
    flavor: EntityFlavor,
    query: Option<&EntityQuery>,
    paging: &ResolvedPaging,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SearchQuery> {
    let default_query = EntityQuery::default();
    let query = query.unwrap_or(&default_query);
    validate_entity_types(schema, query)?;

    let cursor_column = sort_column(query.order.unwrap_or_default());
    let mut builder = SqlBuilder::new(dialect);

    let distinct = if query.bounding_box.is_some() {
        "SELECT DISTINCT"
    } else {
        "SELECT"
    };
    let columns = match flavor {
        EntityFlavor::Admin => {
            "e.id, e.uuid, e.type, e.name, e.auth_key, e.resolved_auth_key, e.status, \
             e.created_at, e.updated_at, ev.version, ev.fields"
        }
        EntityFlavor::Published => {
            "e.id, e.uuid, e.type, e.name, e.auth_key, e.resolved_auth_key, e.created_at, \
             ev.version, ev.fields"
        }
    };
    builder.sql(&format!(
        "{distinct} {columns} FROM {}",
        from_tables(flavor, query, true)
    ));
    builder.condition(&format!("e.{} = ev.id", flavor.version_pointer()));

    push_filters(&mut builder, flavor, query, auth_keys)?;
    push_paging_bounds(&mut builder, cursor_column, paging)?;

    // Effective SQL direction is the logical direction XORed with
    // backwards paging; callers re-reverse rows after a backwards fetch.
    let descending = query.reverse ^ !paging.is_forwards;
    builder.sql(&format!(
        "ORDER BY {}{}",
        cursor_column.column_name(),
        if descending { " DESC" } else { "" }
    ));
    let count_placeholder = builder.add_value(QueryValue::Int(i64::from(paging.count)));
    builder.sql(&format!("LIMIT {count_placeholder}"));

    Ok(SearchQuery {
        sql: builder.finish(),
        cursor_column,
    })
}

fn sample_entities_query(
    dialect: SqlDialect,
    schema: &Schema,
    flavor: EntityFlavor,
    query: Option<&EntityQuery>,
    offset: u32,
    limit: u32,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SqlStatement> {
    let default_query = EntityQuery::default();
    let query = query.unwrap_or(&default_query);
    validate_entity_types(schema, query)?;

    let mut builder = SqlBuilder::new(dialect);
    let distinct = if query.bounding_box.is_some() {
        "SELECT DISTINCT"
    } else {
        "SELECT"
    };
    let columns = match flavor {
        EntityFlavor::Admin => {
            "e.id, e.uuid, e.type, e.name, e.auth_key, e.resolved_auth_key, e.status, \
             e.created_at, e.updated_at, ev.version, ev.fields"
        }
        EntityFlavor::Published => {
            "e.id, e.uuid, e.type, e.name, e.auth_key, e.resolved_auth_key, e.created_at, \
             ev.version, ev.fields"
        }
    };
    builder.sql(&format!(
        "{distinct} {columns} FROM {}",
        from_tables(flavor, query, true)
    ));
    builder.condition(&format!("e.{} = ev.id", flavor.version_pointer()));
    push_filters(&mut builder, flavor, query, auth_keys)?;

    builder.sql("ORDER BY e.uuid");
    let limit_placeholder = builder.add_value(QueryValue::Int(i64::from(limit)));
    let offset_placeholder = builder.add_value(QueryValue::Int(i64::from(offset)));
    builder.sql(&format!(
        "LIMIT {limit_placeholder} OFFSET {offset_placeholder}"
    ));
    Ok(builder.finish())
}

fn total_entities_count_query(
    dialect: SqlDialect,
    schema: &Schema,
    flavor: EntityFlavor,
    query: Option<&EntityQuery>,
    auth_keys: &[ResolvedAuthKey],
) -> Result<SqlStatement> {
    let default_query = EntityQuery::default();
    let query = query.unwrap_or(&default_query);
    validate_entity_types(schema, query)?;

    let mut builder = SqlBuilder::new(dialect);
    // A bounding-box join can duplicate rows, so count distinct ids there.
    let count = if query.bounding_box.is_some() {
        "COUNT(DISTINCT e.id)"
    } else {
        "COUNT(e.id)"
    };
    builder.sql(&format!(
        "SELECT {count} FROM {}",
        from_tables(flavor, query, false)
    ));
    if flavor == EntityFlavor::Published {
        builder.condition("e.published_entity_versions_id IS NOT NULL");
    }
    push_filters(&mut builder, flavor, query, auth_keys)?;
    Ok(builder.finish())
}

/// Every entity type named in the query must exist in the schema. An
/// empty list means "all types" and is not an error.
fn validate_entity_types(schema: &Schema, query: &EntityQuery) -> Result<()> {
    for name in &query.entity_types {
        if schema.get_entity_type(name).is_none() {
            return Err(DossierError::bad_request(format!(
                "Can't find entity type in query: {name}"
            )));
        }
    }
    Ok(())
}

/// The comma-join FROM table list. `include_versions` is false for count
/// queries, which never read version payloads.
fn from_tables(flavor: EntityFlavor, query: &EntityQuery, include_versions: bool) -> String {
    let mut tables = String::from("entities e");
    if include_versions {
        tables.push_str(", entity_versions ev");
    }
    if query.links_to.is_some() {
        if flavor == EntityFlavor::Published {
            tables.push_str(", entities e_to");
        }
        tables.push_str(", entity_version_references evr_to");
    }
    if query.links_from.is_some() {
        tables.push_str(", entities e_from, entity_version_references evr_from");
    }
    if query.bounding_box.is_some() {
        tables.push_str(", entity_version_locations evl");
    }
    tables
}

/// Appends the shared filter conditions in contract order: auth key,
/// entity type, status, links to/from, bounding box, full text.
fn push_filters(
    builder: &mut SqlBuilder,
    flavor: EntityFlavor,
    query: &EntityQuery,
    auth_keys: &[ResolvedAuthKey],
) -> Result<()> {
    if auth_keys.is_empty() {
        return Err(DossierError::bad_request("No resolved auth keys for query"));
    }
    builder.condition_value_in(
        "e.resolved_auth_key",
        auth_keys
            .iter()
            .map(|key| key.resolved_auth_key.clone())
            .collect(),
    );

    if !query.entity_types.is_empty() {
        builder.condition_value_in("e.type", query.entity_types.clone());
    }

    if flavor == EntityFlavor::Admin && !query.status.is_empty() {
        builder.condition_value_in(
            "e.status",
            query
                .status
                .iter()
                .map(|status| status.as_str().to_owned())
                .collect(),
        );
    }

    if let Some(link) = &query.links_to {
        let placeholder = builder.add_value(QueryValue::Int(link.id));
        match flavor {
            EntityFlavor::Admin => {
                builder.condition("evr_to.entity_versions_id = e.latest_entity_versions_id");
                builder.condition(&format!("evr_to.entities_id = {placeholder}"));
            }
            EntityFlavor::Published => {
                builder.condition(&format!("e_to.id = {placeholder}"));
                builder.condition("e_to.published_entity_versions_id IS NOT NULL");
                builder.condition("evr_to.entity_versions_id = e.published_entity_versions_id");
                builder.condition("evr_to.entities_id = e_to.id");
            }
        }
    }

    if let Some(link) = &query.links_from {
        let placeholder = builder.add_value(QueryValue::Int(link.id));
        builder.condition(&format!("e_from.id = {placeholder}"));
        builder.condition(&format!(
            "evr_from.entity_versions_id = e_from.{}",
            flavor.version_pointer()
        ));
        builder.condition("evr_from.entities_id = e.id");
    }

    if let Some(bounding_box) = &query.bounding_box {
        builder.condition(&format!(
            "evl.entity_versions_id = e.{}",
            flavor.version_pointer()
        ));
        let min_lat = builder.add_value(QueryValue::Float(bounding_box.min_lat));
        let max_lat = builder.add_value(QueryValue::Float(bounding_box.max_lat));
        builder.condition(&format!("evl.lat BETWEEN {min_lat} AND {max_lat}"));
        let min_lng = builder.add_value(QueryValue::Float(bounding_box.min_lng));
        let max_lng = builder.add_value(QueryValue::Float(bounding_box.max_lng));
        if bounding_box.min_lng <= bounding_box.max_lng {
            builder.condition(&format!("evl.lng BETWEEN {min_lng} AND {max_lng}"));
        } else {
            // Box wraps the antimeridian.
            builder.condition(&format!("(evl.lng >= {min_lng} OR evl.lng <= {max_lng})"));
        }
    }

    if let Some(text) = &query.text {
        let placeholder = builder.add_value(QueryValue::Text(text.clone()));
        match builder.dialect() {
            SqlDialect::Postgres => {
                builder.condition(&format!(
                    "e.{} @@ websearch_to_tsquery({placeholder})",
                    flavor.fts_column()
                ));
            }
            SqlDialect::Sqlite => {
                builder.condition(&format!(
                    "e.id IN (SELECT rowid FROM {table} WHERE content MATCH {placeholder})",
                    table = flavor.fts_table()
                ));
            }
        }
    }
    Ok(())
}

/// Appends the `after`/`before` bound conditions. Bounds are expressed in
/// ascending cursor order regardless of paging direction; inclusivity
/// switches `>`/`<` to `>=`/`<=`.
fn push_paging_bounds(
    builder: &mut SqlBuilder,
    cursor_column: SortColumn,
    paging: &ResolvedPaging,
) -> Result<()> {
    if let Some(after) = &paging.after {
        check_cursor_type(cursor_column, after)?;
        let operator = if paging.after_inclusive { ">=" } else { ">" };
        let placeholder = builder.add_value(cursor_query_value(after));
        builder.condition(&format!(
            "{} {operator} {placeholder}",
            cursor_column.column_name()
        ));
    }
    if let Some(before) = &paging.before {
        check_cursor_type(cursor_column, before)?;
        let operator = if paging.before_inclusive { "<=" } else { "<" };
        let placeholder = builder.add_value(cursor_query_value(before));
        builder.condition(&format!(
            "{} {operator} {placeholder}",
            cursor_column.column_name()
        ));
    }
    Ok(())
}

fn cursor_query_value(value: &CursorValue) -> QueryValue {
    match value {
        CursorValue::Int(value) => QueryValue::Int(*value),
        CursorValue::Str(value) => QueryValue::Text(value.clone()),
    }
}
