//! End-to-end behaviour of the validation pipeline

#![allow(missing_docs)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use strata_service::prelude::*;

fn load(manager: &Manager, yaml: &str) -> Result<Arc<SchemaFactory>> {
    let document = YamlSchemaLoader::new().parse_str(yaml)?;
    let name = manager.load_schema(&document)?;
    manager.get_factory(&name)
}

fn manager() -> Manager {
    Manager::start(StrataConfig::default().without_discovery()).expect("Test operation failed")
}

fn messages(results: &ValidationResults) -> Vec<(String, String)> {
    results
        .errors
        .iter()
        .map(|e| (e.field.clone(), e.message.clone()))
        .collect()
}

const TAGGED: &str = r"
name: Tagged
version: '1'
description: ''
properties:
  tags:
    type: list[str]
    validator: |
      if len(value) < 2:
          raise ValueError('At least two tags are required')
";

#[test]
fn list_validator_and_item_checks() -> Result<()> {
    let factory = load(&manager(), TAGGED)?;

    assert!(factory.validate(&json!({"tags": ["a", "b"]}))?.valid);

    let cases = [
        (json!(["a"]), "At least two tags are required"),
        (json!([]), "Value cannot be empty"),
        (json!(["a", 1]), "Items in tags must be of type str"),
        (json!(["a", ""]), "Items in list cannot be empty"),
        (json!("a,b"), "Input should be a valid list"),
    ];
    for (tags, expected) in cases {
        let results = factory.validate(&json!({"tags": tags}))?;
        assert_eq!(
            messages(&results),
            vec![("tags".to_string(), expected.to_string())],
            "tags = {tags}"
        );
    }
    Ok(())
}

const PERSON_WITH_ADDRESS: &str = r"
name: Resident
version: '1'
description: ''
properties:
  name:
    type: str
  address:
    validator: |
      assert city != 'Atlantis', 'Atlantis is not a real city'
    properties:
      city:
        type: str
      zip:
        type: str
        constraints:
          pattern: '^\d{5}$'
";

#[test]
fn missing_nested_group_is_required() -> Result<()> {
    let factory = load(&manager(), PERSON_WITH_ADDRESS)?;
    let results = factory.validate(&json!({"name": "Ada"}))?;
    assert_eq!(
        messages(&results),
        vec![("address".to_string(), "Field required".to_string())]
    );
    Ok(())
}

#[test]
fn nested_errors_are_qualified() -> Result<()> {
    let factory = load(&manager(), PERSON_WITH_ADDRESS)?;

    let results = factory.validate(&json!({
        "name": "Ada",
        "address": {"city": "Atlantis", "zip": "12"}
    }))?;
    assert_eq!(
        results.error_fields(),
        vec!["address", "address.zip"],
        "group validator failures are reported against the group field"
    );
    assert_eq!(
        results.errors_for("address").next().map(|e| e.message.as_str()),
        Some("Atlantis is not a real city")
    );

    let results = factory.validate(&json!({"name": "Ada", "address": "Main St"}))?;
    assert_eq!(results.error_fields(), vec!["address"]);
    Ok(())
}

const SHADOWED_GROUP: &str = r"
name: Letter
version: '1'
description: ''
properties:
  address:
    validator: |
      assert address != 'Nowhere Lane', 'Unknown street'
    properties:
      address:
        type: str
        constraints:
          min_length: 5
";

#[test]
fn inner_field_named_like_its_group_is_qualified() -> Result<()> {
    let factory = load(&manager(), SHADOWED_GROUP)?;

    let results = factory.validate(&json!({"address": {"address": "x"}}))?;
    assert_eq!(
        messages(&results),
        vec![(
            "address.address".to_string(),
            "String should have at least 5 characters".to_string()
        )]
    );

    let results = factory.validate(&json!({"address": {"address": "Nowhere Lane"}}))?;
    assert_eq!(
        messages(&results),
        vec![("address".to_string(), "Unknown street".to_string())]
    );
    Ok(())
}

#[test]
fn nested_instance_holds_object() -> Result<()> {
    let factory = load(&manager(), PERSON_WITH_ADDRESS)?;
    let instance = factory
        .build(&json!({"name": "Ada", "address": {"city": "London", "zip": "12345"}}))?
        .expect("valid data builds");
    assert_eq!(
        instance.get("address"),
        Some(&json!({"city": "London", "zip": "12345"}))
    );
    Ok(())
}

const RANGE: &str = r"
name: Range
version: '1'
description: ''
validator:
  mode: after
  source: |
    if end < start:
        raise ValueError('end must not precede start')
properties:
  start:
    type: int
  end:
    type: int
";

#[test]
fn after_model_validator_sees_coerced_fields() -> Result<()> {
    let factory = load(&manager(), RANGE)?;

    assert!(factory.validate(&json!({"start": "1", "end": 2}))?.valid);

    let results = factory.validate(&json!({"start": 3, "end": 1}))?;
    assert_eq!(
        messages(&results),
        vec![("Range".to_string(), "end must not precede start".to_string())]
    );

    // Field failures stop the after validator from running
    let results = factory.validate(&json!({"start": "x", "end": 1}))?;
    assert_eq!(results.error_fields(), vec!["start"]);
    Ok(())
}

#[test]
fn before_model_validator_rewrites_input() -> Result<()> {
    let yaml = r"
name: Trimmed
version: '1'
description: ''
validator: 'name = name.strip()'
properties:
  name:
    type: str
";
    let factory = load(&manager(), yaml)?;
    let instance = factory
        .build(&json!({"name": "  Ada  "}))?
        .expect("valid data builds");
    assert_eq!(instance.get("name"), Some(&json!("Ada")));

    // A failing before validator does not hide field errors
    let results = factory.validate(&json!({}))?;
    assert_eq!(results.error_fields(), vec!["Trimmed", "name"]);
    Ok(())
}

#[test]
fn field_validators_transform_values() -> Result<()> {
    let yaml = r"
name: Code
version: '1'
description: ''
properties:
  code:
    type: str
    reject_empty: false
    validator: 'value = value.upper()'
  age:
    type: int
    validator:
      mode: before
      source: |
        if int(value) < 18:
            raise ValueError('Age must be at least 18')
";
    let factory = load(&manager(), yaml)?;

    let instance = factory
        .build(&json!({"code": "abc", "age": "30"}))?
        .expect("valid data builds");
    assert_eq!(instance.get("code"), Some(&json!("ABC")));
    assert_eq!(instance.get("age"), Some(&json!(30)));

    // Opted out of the empty check
    assert!(factory.validate(&json!({"code": "", "age": 18}))?.valid);

    let results = factory.validate(&json!({"code": "x", "age": "9"}))?;
    assert_eq!(results.error_fields(), vec!["age"]);
    Ok(())
}

#[test]
fn context_and_defaults() -> Result<()> {
    let yaml = r"
name: Member
version: '1'
description: ''
context:
  minimum_age: 21
properties:
  age:
    type: int
    validator: |
      if value < context['minimum_age']:
          raise ValueError('Members must be at least ' + str(context['minimum_age']))
  nickname:
    type: str
    default: null
";
    let factory = load(&manager(), yaml)?;

    let instance = factory.build(&json!({"age": 30}))?.expect("valid data builds");
    assert_eq!(instance.get("nickname"), Some(&Value::Null));
    assert_eq!(factory.model().json_schema()["required"], json!(["age"]));

    let results = factory.validate(&json!({"age": 20}))?;
    assert_eq!(results.errors[0].message, "Members must be at least 21");
    Ok(())
}

#[test]
fn non_object_input_is_reported() -> Result<()> {
    let factory = load(&manager(), RANGE)?;
    let results = factory.validate(&json!([1, 2]))?;
    assert_eq!(
        messages(&results),
        vec![("Range".to_string(), "Input should be a valid dictionary".to_string())]
    );
    assert_eq!(results.data, json!([1, 2]));
    Ok(())
}

const REPEATER: &str = r"
name: Repeater
version: '1'
description: ''
properties:
  n:
    type: int
    validator: |
      padding = [] * value
      label = 'ab' * value
";

#[test]
fn sequence_repetition_is_bounded() -> Result<()> {
    let factory = load(&manager(), REPEATER)?;
    assert!(factory.validate(&json!({"n": 3}))?.valid);

    let results = factory.validate(&json!({"n": 3_000_000_000_i64}))?;
    assert_eq!(
        messages(&results),
        vec![(
            "n".to_string(),
            "Validator exceeded maximum iterations (100000)".to_string()
        )]
    );
    Ok(())
}

#[test]
fn repeated_validation_does_not_leak_errors() -> Result<()> {
    let factory = load(&manager(), TAGGED)?;
    let bad = json!({"tags": ["a"]});

    let first = factory.validate(&bad)?;
    let second = factory.validate(&bad)?;
    assert_eq!(first, second);
    assert_eq!(second.errors.len(), 1);

    assert!(factory.validate(&json!({"tags": ["a", "b"]}))?.valid);
    assert!(factory.last_errors().is_empty());
    Ok(())
}

#[test]
fn concurrent_validation_of_one_model() -> Result<()> {
    let factory = load(&manager(), TAGGED)?;

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let factory = Arc::clone(&factory);
            scope.spawn(move || {
                for round in 0..50 {
                    let valid = (worker + round) % 2 == 0;
                    let data = if valid {
                        json!({"tags": ["a", "b"]})
                    } else {
                        json!({"tags": ["a"]})
                    };
                    let results = factory.validate(&data).expect("Test operation failed");
                    assert_eq!(results.valid, valid);
                    assert_eq!(results.errors.len(), usize::from(!valid));
                }
            });
        }
    });
    Ok(())
}

#[test]
fn transpilation_is_deterministic() -> Result<()> {
    let document = YamlSchemaLoader::new().parse_str(PERSON_WITH_ADDRESS)?;
    let transpiler = SchemaTranspiler::default();
    let first = transpiler.transpile(&document)?;
    let second = transpiler.transpile(&document)?;

    assert_eq!(first.json_schema(), second.json_schema());
    let data = json!({"name": 5, "address": {"city": "Atlantis"}});
    assert_eq!(first.run(&data)?.errors.into_errors(), second.run(&data)?.errors.into_errors());
    Ok(())
}
