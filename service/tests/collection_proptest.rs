//! Property-based tests for collection fields
//!
//! Generated item lists exercise the synthesized item checks and set
//! de-duplication.

#![allow(missing_docs)]

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Value, json};
use strata_service::prelude::*;

fn factory(type_name: &str) -> Arc<SchemaFactory> {
    let manager =
        Manager::start(StrataConfig::default().without_discovery()).expect("Test operation failed");
    let document = SchemaDocument::new("Bag", "1").with_property("items", PropertyDecl::leaf(type_name));
    manager.load_schema(&document).expect("Test operation failed");
    manager.get_factory("Bag").expect("Test operation failed")
}

/// Non-empty word
fn arb_word() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,8}"
}

/// Item that is not a string
fn arb_non_string() -> impl Strategy<Value = Value> {
    prop_oneof![
        (1i64..10_000).prop_map(|n| json!(n)),
        Just(json!(true)),
        Just(json!([1])),
    ]
}

fn first_seen(items: &[i64]) -> Vec<i64> {
    let mut seen = Vec::new();
    for item in items {
        if !seen.contains(item) {
            seen.push(*item);
        }
    }
    seen
}

proptest! {
    /// Lists of non-empty strings always pass
    #[test]
    fn string_lists_pass(words in prop::collection::vec(arb_word(), 1..20)) {
        let factory = factory("list[str]");
        let results = factory.validate(&json!({"items": words})).expect("Test operation failed");
        prop_assert!(results.valid, "{:?}", results.errors);
    }

    /// One wrongly typed item is reported against the field
    #[test]
    fn wrong_item_type_is_reported(
        words in prop::collection::vec(arb_word(), 0..10),
        bad in arb_non_string(),
        position in any::<prop::sample::Index>(),
    ) {
        let mut items: Vec<Value> = words.into_iter().map(Value::String).collect();
        let at = position.index(items.len() + 1);
        items.insert(at, bad);

        let factory = factory("list[str]");
        let results = factory.validate(&json!({"items": items})).expect("Test operation failed");
        prop_assert!(!results.valid);
        prop_assert_eq!(results.errors.len(), 1);
        prop_assert_eq!(&results.errors[0].field, "items");
        prop_assert_eq!(&results.errors[0].message, "Items in items must be of type str");
    }

    /// An empty string item is rejected before its type is checked
    #[test]
    fn empty_item_is_reported(
        words in prop::collection::vec(arb_word(), 0..10),
        position in any::<prop::sample::Index>(),
    ) {
        let mut items: Vec<Value> = words.into_iter().map(Value::String).collect();
        let at = position.index(items.len() + 1);
        items.insert(at, json!(""));

        let factory = factory("list[str]");
        let results = factory.validate(&json!({"items": items})).expect("Test operation failed");
        prop_assert_eq!(results.errors.len(), 1);
        prop_assert_eq!(&results.errors[0].message, "Items in list cannot be empty");
    }

    /// Sets keep the first occurrence of each item
    #[test]
    fn sets_deduplicate(items in prop::collection::vec(1i64..20, 1..30)) {
        let factory = factory("set[int]");
        let instance = factory
            .build(&json!({"items": items}))
            .expect("Test operation failed")
            .expect("valid data builds");
        prop_assert_eq!(instance.get("items"), Some(&json!(first_seen(&items))));
    }

    /// Validating never mutates the echoed input
    #[test]
    fn input_is_echoed(words in prop::collection::vec(".*", 0..10)) {
        let factory = factory("list[str]");
        let data = json!({"items": words});
        let results = factory.validate(&data).expect("Test operation failed");
        prop_assert_eq!(results.data, data);
    }
}
