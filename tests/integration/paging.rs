//! Property tests for paging resolution and cursor encoding.

use dossier::{resolve_paging, CursorValue, Paging, PagingInclusivity};
use proptest::prelude::*;

proptest! {
    #[test]
    fn first_n_over_fetches_exactly_one(n in 0u32..10_000) {
        let paging = Paging { first: Some(n), ..Default::default() };
        let resolved = resolve_paging(Some(&paging), PagingInclusivity::default()).unwrap();
        prop_assert!(resolved.is_forwards);
        prop_assert_eq!(resolved.count, n + 1);
    }

    #[test]
    fn count_never_wraps_to_zero(n in 0u32..=u32::MAX) {
        let paging = Paging { first: Some(n), ..Default::default() };
        let resolved = resolve_paging(Some(&paging), PagingInclusivity::default()).unwrap();
        prop_assert_eq!(resolved.count, n.saturating_add(1));
        prop_assert!(resolved.count > 0);
    }

    #[test]
    fn last_n_over_fetches_exactly_one(n in 0u32..10_000) {
        let paging = Paging { last: Some(n), ..Default::default() };
        let resolved = resolve_paging(Some(&paging), PagingInclusivity::default()).unwrap();
        prop_assert!(!resolved.is_forwards);
        prop_assert_eq!(resolved.count, n + 1);
    }

    #[test]
    fn first_and_last_always_conflict(first in 0u32..100, last in 0u32..100) {
        let paging = Paging {
            first: Some(first),
            last: Some(last),
            ..Default::default()
        };
        let error = resolve_paging(Some(&paging), PagingInclusivity::default()).unwrap_err();
        prop_assert_eq!(error.to_string(), "Both first and last are defined");
    }

    #[test]
    fn int_cursors_round_trip(value in any::<i64>()) {
        let cursor = CursorValue::Int(value);
        let encoded = cursor.encode().unwrap();
        prop_assert_eq!(CursorValue::decode(&encoded).unwrap(), cursor);
    }

    #[test]
    fn str_cursors_round_trip(value in ".*") {
        let cursor = CursorValue::Str(value);
        let encoded = cursor.encode().unwrap();
        prop_assert_eq!(CursorValue::decode(&encoded).unwrap(), cursor);
    }

    #[test]
    fn encoded_cursors_are_url_safe(value in ".*") {
        let encoded = CursorValue::Str(value).encode().unwrap();
        prop_assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn decoding_arbitrary_input_never_panics(input in ".*") {
        // Either a valid cursor or the uniform bad-request error.
        if let Err(error) = CursorValue::decode(&input) {
            prop_assert_eq!(error.to_string(), "Invalid format of cursor");
        }
    }

    #[test]
    fn cursors_flow_through_resolution(value in any::<i64>(), n in 1u32..100) {
        let after = CursorValue::Int(value).encode().unwrap();
        let paging = Paging {
            first: Some(n),
            after: Some(after),
            ..Default::default()
        };
        let resolved = resolve_paging(Some(&paging), PagingInclusivity::default()).unwrap();
        prop_assert_eq!(resolved.after, Some(CursorValue::Int(value)));
        prop_assert_eq!(resolved.before, None);
    }
}
