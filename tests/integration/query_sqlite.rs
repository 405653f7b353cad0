//! Generated-SQL tests for the SQLite dialect: `?n` placeholders, expanded
//! `IN` lists instead of array parameters, and FTS5 full text.

use dossier::query::{EntityStatus, QueryValue};
use dossier::schema::SchemaSpecificationWithMigrations;
use dossier::{
    resolve_paging, search_admin_entities_query, search_published_entities_query,
    total_admin_entities_count_query, EntityQuery, PagingInclusivity, ResolvedAuthKey,
    ResolvedPaging, Schema, SqlDialect,
};
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

#[test]
fn search_admin_no_query() {
    let result = search_admin_entities_query(
        SqlDialect::Sqlite,
        &schema(),
        None,
        &default_paging(),
        &auth_none(),
    )
    .expect("generates");
    assert_eq!(
        result.sql.text,
        "SELECT e.id, e.uuid, e.type, e.name, e.auth_key, e.resolved_auth_key, e.status, \
         e.created_at, e.updated_at, ev.version, ev.fields \
         FROM entities e, entity_versions ev \
         WHERE e.latest_entity_versions_id = ev.id \
         AND e.resolved_auth_key = ?1 ORDER BY e.id LIMIT ?2"
    );
    assert_eq!(
        result.sql.values,
        vec![QueryValue::from("none"), QueryValue::Int(26)]
    );
}

#[test]
fn status_list_expands_to_in_list() {
    let query = EntityQuery {
        status: vec![EntityStatus::Draft, EntityStatus::Published],
        ..Default::default()
    };
    let result = search_admin_entities_query(
        SqlDialect::Sqlite,
        &schema(),
        Some(&query),
        &default_paging(),
        &auth_none(),
    )
    .expect("generates");
    assert!(result.sql.text.contains("AND e.status IN (?2, ?3)"));
    assert_eq!(
        result.sql.values,
        vec![
            QueryValue::from("none"),
            QueryValue::from("draft"),
            QueryValue::from("published"),
            QueryValue::Int(26),
        ]
    );
}

#[test]
fn single_element_lists_compile_to_equality() {
    let query = EntityQuery {
        entity_types: vec!["Foo".to_owned()],
        status: vec![EntityStatus::Archived],
        ..Default::default()
    };
    let result = search_admin_entities_query(
        SqlDialect::Sqlite,
        &schema(),
        Some(&query),
        &default_paging(),
        &auth_none(),
    )
    .expect("generates");
    assert!(result.sql.text.contains("AND e.type = ?2"));
    assert!(result.sql.text.contains("AND e.status = ?3"));
}

#[test]
fn expanded_lists_shift_later_parameter_positions() {
    let query = EntityQuery {
        entity_types: vec!["Foo".to_owned(), "Bar".to_owned()],
        text: Some("fox".to_owned()),
        ..Default::default()
    };
    let result = search_admin_entities_query(
        SqlDialect::Sqlite,
        &schema(),
        Some(&query),
        &default_paging(),
        &auth_none(),
    )
    .expect("generates");
    assert!(result.sql.text.contains("AND e.type IN (?2, ?3)"));
    assert!(result
        .sql
        .text
        .contains("AND e.id IN (SELECT rowid FROM entities_latest_fts WHERE content MATCH ?4)"));
    assert!(result.sql.text.ends_with("LIMIT ?5"));
    assert_eq!(
        result.sql.values,
        vec![
            QueryValue::from("none"),
            QueryValue::from("Foo"),
            QueryValue::from("Bar"),
            QueryValue::from("fox"),
            QueryValue::Int(26),
        ]
    );
}

#[test]
fn full_text_uses_flavor_table() {
    let query = EntityQuery {
        text: Some("hello".to_owned()),
        ..Default::default()
    };
    let published = search_published_entities_query(
        SqlDialect::Sqlite,
        &schema(),
        Some(&query),
        &default_paging(),
        &auth_none(),
    )
    .expect("generates");
    assert!(published.sql.text.contains(
        "AND e.id IN (SELECT rowid FROM entities_published_fts WHERE content MATCH ?2)"
    ));
}

#[test]
fn no_text_list_values_in_sqlite_statements() {
    let query = EntityQuery {
        entity_types: vec!["Foo".to_owned(), "Bar".to_owned()],
        status: vec![EntityStatus::Draft, EntityStatus::Modified],
        ..Default::default()
    };
    let auth_keys = vec![
        ResolvedAuthKey::new("none", "none"),
        ResolvedAuthKey::new("subject", "subject-1"),
    ];
    let result = search_admin_entities_query(
        SqlDialect::Sqlite,
        &schema(),
        Some(&query),
        &default_paging(),
        &auth_keys,
    )
    .expect("generates");
    assert!(result.sql.text.contains("e.resolved_auth_key IN (?1, ?2)"));
    assert!(result
        .sql
        .values
        .iter()
        .all(|value| !matches!(value, QueryValue::TextList(_))));
}

#[test]
fn total_count_admin() {
    let result =
        total_admin_entities_count_query(SqlDialect::Sqlite, &schema(), None, &auth_none())
            .expect("generates");
    assert_eq!(
        result.text,
        "SELECT COUNT(e.id) FROM entities e WHERE e.resolved_auth_key = ?1"
    );
}
