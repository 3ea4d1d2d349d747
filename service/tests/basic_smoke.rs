#![allow(missing_docs)]

use serde_json::json;
use strata_service::prelude::*;

const PERSON: &str = r"
name: Person
version: '1.0'
description: A person with an age limit
properties:
  name:
    type: str
  age:
    type: int
    validator: |
      if value < 18:
          raise ValueError('Age must be at least 18')
";

fn manager() -> Result<Manager> {
    let manager = Manager::start(StrataConfig::default().without_discovery())?;
    let document = YamlSchemaLoader::new().parse_str(PERSON)?;
    manager.load_schema(&document)?;
    Ok(manager)
}

#[test]
fn validates_adult() -> Result<()> {
    let manager = manager()?;
    let data = json!({"name": "Ada", "age": 30});

    let results = manager.validate(&data, "Person")?;
    assert!(results.valid);
    assert!(results.errors.is_empty());
    assert_eq!(results.data, data);
    assert_eq!(results.schema["title"], json!("Person"));
    assert_eq!(results.schema["required"], json!(["name", "age"]));
    Ok(())
}

#[test]
fn reports_minor_against_age() -> Result<()> {
    let manager = manager()?;
    let results = manager.validate(&json!({"name": "Kid", "age": 10}), "Person")?;

    assert!(!results.valid);
    assert_eq!(results.errors.len(), 1);
    assert_eq!(results.errors[0].field, "age");
    assert!(results.errors[0].message.contains("at least 18"));
    Ok(())
}

#[test]
fn builds_typed_instance() -> Result<()> {
    let manager = manager()?;
    let factory = manager.get_factory("Person")?;

    let instance = factory
        .build(&json!({"name": "Ada", "age": "42"}))?
        .expect("valid data builds");
    assert_eq!(instance.model, "Person");
    assert_eq!(instance.get("age"), Some(&json!(42)));
    assert_eq!(instance.to_value(), json!({"name": "Ada", "age": 42}));

    assert!(factory.build(&json!({"name": "Kid", "age": 3}))?.is_none());
    assert_eq!(factory.last_errors()[0].field, "age");
    Ok(())
}

#[test]
fn construct_reports_every_error() -> Result<()> {
    let manager = manager()?;
    let model = manager.get_model("Person")?;

    let err = model
        .construct(&json!({"age": "many"}))
        .expect_err("invalid data cannot be constructed");
    match err {
        StrataError::Construction { model, errors } => {
            assert_eq!(model, "Person");
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            assert_eq!(fields, vec!["name", "age"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}
