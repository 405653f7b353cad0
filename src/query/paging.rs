#![forbid(unsafe_code)]

//! Relay-style paging resolution and opaque cursor encoding.
//!
//! `first`/`after`/`last`/`before` arguments collapse into a single
//! [`ResolvedPaging`] descriptor. The resolved count over-fetches by one
//! row so the generator's consumer can detect `hasNextPage` /
//! `hasPreviousPage` without a second query.
//!
//! Cursors are URL-safe base64 over a compact tagged JSON payload, so a
//! cursor minted for one sort column cannot silently be replayed against a
//! query ordered by a column of another type.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{DossierError, Result};
use crate::query::entity_query::Paging;

/// Page size used when neither `first` nor `last` is given.
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Typed sort-key value carried inside an opaque cursor.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "camelCase")]
pub enum CursorValue {
    /// Integer sort key (internal entity id).
    Int(i64),
    /// String sort key (entity name, timestamp text).
    Str(String),
}

impl CursorValue {
    /// Wire name of the value's type tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            CursorValue::Int(_) => "int",
            CursorValue::Str(_) => "str",
        }
    }

    /// Encodes the value into an opaque cursor string.
    pub fn encode(&self) -> Result<String> {
        let payload = serde_json::to_vec(self)
            .map_err(|error| DossierError::Generic(format!("cursor serialization: {error}")))?;
        Ok(URL_SAFE_NO_PAD.encode(payload))
    }

    /// Decodes an opaque cursor string back into a typed value.
    pub fn decode(cursor: &str) -> Result<Self> {
        let payload = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|_| DossierError::bad_request("Invalid format of cursor"))?;
        serde_json::from_slice(&payload)
            .map_err(|_| DossierError::bad_request("Invalid format of cursor"))
    }
}

/// Switches `after`/`before` bounds from exclusive to inclusive, used to
/// resume iteration from a known-included row.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PagingInclusivity {
    /// Compare the after bound with `>=` instead of `>`.
    pub after_inclusive: bool,
    /// Compare the before bound with `<=` instead of `<`.
    pub before_inclusive: bool,
}

/// Normalized paging descriptor consumed by the query generator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedPaging {
    /// Forwards (`first`/`after`) or backwards (`last`/`before`) paging.
    pub is_forwards: bool,
    /// Requested page size plus one over-fetch sentinel row.
    pub count: u32,
    /// Decoded lower bound, in ascending cursor order.
    pub after: Option<CursorValue>,
    /// Decoded upper bound, in ascending cursor order.
    pub before: Option<CursorValue>,
    /// Whether the after bound is inclusive.
    pub after_inclusive: bool,
    /// Whether the before bound is inclusive.
    pub before_inclusive: bool,
}

/// Collapses relay paging arguments into a [`ResolvedPaging`].
///
/// `first` and `last` together are rejected here; the generator assumes
/// the conflict cannot reach it.
pub fn resolve_paging(
    paging: Option<&Paging>,
    inclusivity: PagingInclusivity,
) -> Result<ResolvedPaging> {
    let default = Paging::default();
    let paging = paging.unwrap_or(&default);

    if paging.first.is_some() && paging.last.is_some() {
        return Err(DossierError::bad_request("Both first and last are defined"));
    }
    let is_forwards = paging.last.is_none();
    let requested = if is_forwards {
        paging.first
    } else {
        paging.last
    }
    .unwrap_or(DEFAULT_PAGE_SIZE);

    let after = paging
        .after
        .as_deref()
        .map(CursorValue::decode)
        .transpose()?;
    let before = paging
        .before
        .as_deref()
        .map(CursorValue::decode)
        .transpose()?;

    Ok(ResolvedPaging {
        is_forwards,
        // Saturates so a u32::MAX page size cannot wrap to LIMIT 0.
        count: requested.saturating_add(1),
        after,
        before,
        after_inclusive: inclusivity.after_inclusive,
        before_inclusive: inclusivity.before_inclusive,
    })
}
