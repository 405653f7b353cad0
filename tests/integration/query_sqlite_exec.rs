//! Executes generated SQLite statements against an in-memory database to
//! prove the text is valid SQL and the filters select the right rows, not
//! just the expected strings.

use dossier::query::{BoundingBox, EntityLink, EntityStatus, QueryValue};
use dossier::schema::SchemaSpecificationWithMigrations;
use dossier::{
    resolve_paging, sample_admin_entities_query, search_admin_entities_query,
    search_published_entities_query, total_admin_entities_count_query,
    total_published_entities_count_query, CursorValue, EntityQuery, Paging, PagingInclusivity,
    ResolvedAuthKey, ResolvedPaging, Schema, SqlDialect, SqlStatement,
};
use rusqlite::Connection;
use serde_json::json;

fn schema() -> Schema {
    let spec: SchemaSpecificationWithMigrations = serde_json::from_value(json!({
        "schemaKind": "admin",
        "version": 1,
        "entityTypes": [
            {"name": "Foo", "fields": []},
            {"name": "Bar", "fields": []}
        ],
        "componentTypes": [],
        "patterns": [],
        "indexes": [],
        "migrations": []
    }))
    .expect("fixture spec deserializes");
    Schema::create_and_validate(spec).expect("fixture spec validates")
}

fn auth_none() -> Vec<ResolvedAuthKey> {
    vec![ResolvedAuthKey::new("none", "none")]
}

fn default_paging() -> ResolvedPaging {
    resolve_paging(None, PagingInclusivity::default()).expect("default paging resolves")
}

/// Three entities: Alpha (draft, references Beta, has a location), Beta
/// (published, references Gamma), Gamma (modified, published version older
/// than latest).
fn seeded_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("opens in-memory database");
    conn.execute_batch(
        "CREATE TABLE entities (
            id INTEGER PRIMARY KEY,
            uuid TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL,
            name TEXT NOT NULL,
            auth_key TEXT NOT NULL,
            resolved_auth_key TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            latest_entity_versions_id INTEGER,
            published_entity_versions_id INTEGER
        );
        CREATE TABLE entity_versions (
            id INTEGER PRIMARY KEY,
            entities_id INTEGER NOT NULL,
            version INTEGER NOT NULL,
            fields TEXT NOT NULL
        );
        CREATE TABLE entity_version_references (
            entity_versions_id INTEGER NOT NULL,
            entities_id INTEGER NOT NULL
        );
        CREATE TABLE entity_version_locations (
            entity_versions_id INTEGER NOT NULL,
            lat REAL NOT NULL,
            lng REAL NOT NULL
        );
        CREATE VIRTUAL TABLE entities_latest_fts USING fts5(content);
        CREATE VIRTUAL TABLE entities_published_fts USING fts5(content);

        INSERT INTO entities VALUES
            (1, 'a1', 'Foo', 'Alpha', 'none', 'none', 'draft',
             '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z', 101, NULL),
            (2, 'b2', 'Foo', 'Beta', 'none', 'none', 'published',
             '2024-01-02T00:00:00Z', '2024-01-02T00:00:00Z', 102, 102),
            (3, 'c3', 'Bar', 'Gamma', 'none', 'none', 'modified',
             '2024-01-03T00:00:00Z', '2024-01-04T00:00:00Z', 105, 104);
        INSERT INTO entity_versions VALUES
            (101, 1, 1, '{}'),
            (102, 2, 1, '{}'),
            (104, 3, 1, '{}'),
            (105, 3, 2, '{}');
        INSERT INTO entity_version_references VALUES (101, 2), (102, 3);
        INSERT INTO entity_version_locations VALUES (101, 59.3, 18.1);
        INSERT INTO entities_latest_fts (rowid, content) VALUES
            (1, 'hello world'), (2, 'quick brown fox'), (3, 'gamma station');
        INSERT INTO entities_published_fts (rowid, content) VALUES
            (2, 'quick brown fox'), (3, 'gamma station');",
    )
    .expect("seeds fixture data");
    conn
}

fn bind_value(value: &QueryValue) -> rusqlite::types::Value {
    match value {
        QueryValue::Int(value) => rusqlite::types::Value::Integer(*value),
        QueryValue::Float(value) => rusqlite::types::Value::Real(*value),
        QueryValue::Text(value) => rusqlite::types::Value::Text(value.clone()),
        QueryValue::TextList(_) => unreachable!("array parameters are postgres-only"),
    }
}

fn query_ids(conn: &Connection, statement: &SqlStatement) -> Vec<i64> {
    let mut prepared = conn.prepare(&statement.text).expect("statement prepares");
    prepared
        .query_map(
            rusqlite::params_from_iter(statement.values.iter().map(bind_value)),
            |row| row.get::<_, i64>(0),
        )
        .expect("statement executes")
        .collect::<rusqlite::Result<Vec<i64>>>()
        .expect("rows read")
}

fn query_count(conn: &Connection, statement: &SqlStatement) -> i64 {
    conn.query_row(
        &statement.text,
        rusqlite::params_from_iter(statement.values.iter().map(bind_value)),
        |row| row.get(0),
    )
    .expect("count executes")
}

fn search_admin_ids(conn: &Connection, query: Option<&EntityQuery>) -> Vec<i64> {
    search_admin_ids_paged(conn, query, &default_paging())
}

fn search_admin_ids_paged(
    conn: &Connection,
    query: Option<&EntityQuery>,
    paging: &ResolvedPaging,
) -> Vec<i64> {
    let result =
        search_admin_entities_query(SqlDialect::Sqlite, &schema(), query, paging, &auth_none())
            .expect("generates");
    query_ids(conn, &result.sql)
}

fn search_published_ids(conn: &Connection, query: Option<&EntityQuery>) -> Vec<i64> {
    let result = search_published_entities_query(
        SqlDialect::Sqlite,
        &schema(),
        query,
        &default_paging(),
        &auth_none(),
    )
    .expect("generates");
    query_ids(conn, &result.sql)
}

#[test]
fn admin_search_sees_every_entity() {
    let conn = seeded_connection();
    assert_eq!(search_admin_ids(&conn, None), vec![1, 2, 3]);
}

#[test]
fn published_search_sees_only_published_entities() {
    let conn = seeded_connection();
    assert_eq!(search_published_ids(&conn, None), vec![2, 3]);
}

#[test]
fn entity_type_filter() {
    let conn = seeded_connection();
    let query = EntityQuery {
        entity_types: vec!["Foo".to_owned()],
        ..Default::default()
    };
    assert_eq!(search_admin_ids(&conn, Some(&query)), vec![1, 2]);
}

#[test]
fn status_filter_with_expanded_in_list() {
    let conn = seeded_connection();
    let query = EntityQuery {
        status: vec![EntityStatus::Draft, EntityStatus::Modified],
        ..Default::default()
    };
    assert_eq!(search_admin_ids(&conn, Some(&query)), vec![1, 3]);
}

#[test]
fn links_to_follows_latest_version_references() {
    let conn = seeded_connection();
    let query = EntityQuery {
        links_to: Some(EntityLink { id: 2 }),
        ..Default::default()
    };
    assert_eq!(search_admin_ids(&conn, Some(&query)), vec![1]);
}

#[test]
fn links_from_yields_referenced_entities() {
    let conn = seeded_connection();
    let query = EntityQuery {
        links_from: Some(EntityLink { id: 2 }),
        ..Default::default()
    };
    assert_eq!(search_admin_ids(&conn, Some(&query)), vec![3]);
}

#[test]
fn published_links_to_requires_published_endpoint() {
    let conn = seeded_connection();
    let query = EntityQuery {
        links_to: Some(EntityLink { id: 3 }),
        ..Default::default()
    };
    assert_eq!(search_published_ids(&conn, Some(&query)), vec![2]);

    // Alpha is unpublished, so nothing links to it in the published view
    // even though Beta's draft did at some point.
    let query = EntityQuery {
        links_to: Some(EntityLink { id: 1 }),
        ..Default::default()
    };
    assert_eq!(search_published_ids(&conn, Some(&query)), Vec::<i64>::new());
}

#[test]
fn bounding_box_filter() {
    let conn = seeded_connection();
    let query = EntityQuery {
        bounding_box: Some(BoundingBox {
            min_lat: 59.0,
            max_lat: 60.0,
            min_lng: 18.0,
            max_lng: 19.0,
        }),
        ..Default::default()
    };
    assert_eq!(search_admin_ids(&conn, Some(&query)), vec![1]);

    let miss = EntityQuery {
        bounding_box: Some(BoundingBox {
            min_lat: 0.0,
            max_lat: 1.0,
            min_lng: 0.0,
            max_lng: 1.0,
        }),
        ..Default::default()
    };
    assert_eq!(search_admin_ids(&conn, Some(&miss)), Vec::<i64>::new());
}

#[test]
fn full_text_search_uses_the_flavor_table() {
    let conn = seeded_connection();
    let query = EntityQuery {
        text: Some("hello".to_owned()),
        ..Default::default()
    };
    assert_eq!(search_admin_ids(&conn, Some(&query)), vec![1]);
    // Alpha is not in the published index.
    assert_eq!(search_published_ids(&conn, Some(&query)), Vec::<i64>::new());

    let query = EntityQuery {
        text: Some("fox".to_owned()),
        ..Default::default()
    };
    assert_eq!(search_published_ids(&conn, Some(&query)), vec![2]);
}

#[test]
fn backwards_paging_returns_descending_rows() {
    let conn = seeded_connection();
    let paging = Paging {
        last: Some(1),
        ..Default::default()
    };
    let resolved = resolve_paging(Some(&paging), PagingInclusivity::default()).expect("resolves");
    // Over-fetches by one, so a page of 1 comes back as two rows.
    assert_eq!(search_admin_ids_paged(&conn, None, &resolved), vec![3, 2]);
}

#[test]
fn after_cursor_skips_earlier_rows() {
    let conn = seeded_connection();
    let after = CursorValue::Int(1).encode().expect("encodes");
    let paging = Paging {
        after: Some(after),
        ..Default::default()
    };
    let resolved = resolve_paging(Some(&paging), PagingInclusivity::default()).expect("resolves");
    assert_eq!(search_admin_ids_paged(&conn, None, &resolved), vec![2, 3]);
}

#[test]
fn sample_pages_in_uuid_order() {
    let conn = seeded_connection();
    let statement =
        sample_admin_entities_query(SqlDialect::Sqlite, &schema(), None, 1, 2, &auth_none())
            .expect("generates");
    assert_eq!(query_ids(&conn, &statement), vec![2, 3]);
}

#[test]
fn total_counts() {
    let conn = seeded_connection();
    let admin = total_admin_entities_count_query(SqlDialect::Sqlite, &schema(), None, &auth_none())
        .expect("generates");
    assert_eq!(query_count(&conn, &admin), 3);

    let published =
        total_published_entities_count_query(SqlDialect::Sqlite, &schema(), None, &auth_none())
            .expect("generates");
    assert_eq!(query_count(&conn, &published), 2);

    let boxed = EntityQuery {
        bounding_box: Some(BoundingBox {
            min_lat: 59.0,
            max_lat: 60.0,
            min_lng: 18.0,
            max_lng: 19.0,
        }),
        ..Default::default()
    };
    let admin_boxed =
        total_admin_entities_count_query(SqlDialect::Sqlite, &schema(), Some(&boxed), &auth_none())
            .expect("generates");
    assert_eq!(query_count(&conn, &admin_boxed), 1);
}

#[test]
fn unknown_auth_key_matches_nothing() {
    let conn = seeded_connection();
    let result = search_admin_entities_query(
        SqlDialect::Sqlite,
        &schema(),
        None,
        &default_paging(),
        &[ResolvedAuthKey::new("other", "other")],
    )
    .expect("generates");
    assert_eq!(query_ids(&conn, &result.sql), Vec::<i64>::new());
}
