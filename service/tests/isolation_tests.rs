//! Capability isolation for validator expressions
//!
//! Forbidden names must fail at schema load time with a forbidden
//! capability error, never as a validation record.

#![allow(missing_docs)]

use serde_json::json;
use strata_service::expression::{
    BLOCKED_CALLABLES, BLOCKED_MODULES, EvaluationError, Evaluator, Parser, Scope,
};
use strata_service::prelude::*;

fn document_with_validator(source: &str) -> SchemaDocument {
    SchemaDocument::new("Probe", "1").with_property(
        "value",
        PropertyDecl::leaf("str").with_validator(source),
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn restricted() -> Manager {
    init_tracing();
    Manager::start(StrataConfig::default().without_discovery()).expect("Test operation failed")
}

fn unrestricted() -> Manager {
    init_tracing();
    let mut config = StrataConfig::default().without_discovery();
    config.allow_unsafe_capabilities = true;
    Manager::start(config).expect("Test operation failed")
}

#[test]
fn listing_the_filesystem_is_forbidden() {
    let err = restricted()
        .load_schema(&document_with_validator("print(os.listdir('/'))"))
        .expect_err("os access must be refused");
    assert!(err.is_forbidden());
    match err {
        StrataError::ForbiddenCapability {
            capability,
            validator,
        } => {
            assert_eq!(capability, "os");
            assert_eq!(validator, "value_validator");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn every_blocked_module_is_refused() {
    let manager = restricted();
    for module in BLOCKED_MODULES {
        for source in [format!("import {module}"), format!("x = {module}.name")] {
            let err = manager
                .load_schema(&document_with_validator(&source))
                .expect_err("blocked module accepted");
            assert!(err.is_forbidden(), "{source}: {err}");
        }
    }
}

#[test]
fn every_blocked_callable_is_refused() {
    let manager = restricted();
    for callable in BLOCKED_CALLABLES {
        let source = format!("x = {callable}('value')");
        let err = manager
            .load_schema(&document_with_validator(&source))
            .expect_err("blocked callable accepted");
        assert!(err.is_forbidden(), "{source}: {err}");
    }
}

#[test]
fn dead_branches_are_screened_too() {
    let err = restricted()
        .load_schema(&document_with_validator("if False:\n    eval('1')"))
        .expect_err("eval in a dead branch accepted");
    assert!(err.is_forbidden());
}

#[test]
fn dunder_attributes_are_refused() {
    let err = restricted()
        .load_schema(&document_with_validator("x = value.__class__"))
        .expect_err("dunder access accepted");
    assert!(err.is_forbidden());
}

#[test]
fn model_validators_are_screened() {
    let document = SchemaDocument::new("Probe", "1")
        .with_property("value", PropertyDecl::leaf("str"))
        .with_validator("import subprocess");
    let err = restricted()
        .load_schema(&document)
        .expect_err("model validator import accepted");
    match err {
        StrataError::ForbiddenCapability { validator, .. } => {
            assert_eq!(validator, "validate_probe");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn forbidden_load_leaves_registry_untouched() {
    let manager = restricted();
    let _ = manager.load_schema(&document_with_validator("import os"));
    assert!(manager.get_available_schemas().is_empty());
    assert!(matches!(
        manager.get_factory("Probe"),
        Err(StrataError::SchemaNotFound(_))
    ));
}

#[test]
fn unsafe_flag_lifts_the_screen() -> Result<()> {
    let manager = unrestricted();
    manager.load_schema(&document_with_validator("print(os.listdir('/'))"))?;

    // The names are no longer blocked, but nothing provides them either
    let results = manager.validate(&json!({"value": "x"}), "Probe")?;
    assert!(!results.valid);
    assert_eq!(results.errors[0].field, "value");
    Ok(())
}

#[test]
fn runtime_guard_catches_unscreened_programs() {
    let program = Parser::new()
        .parse("result = open('/etc/passwd')")
        .expect("Test operation failed");
    let err = Evaluator::new()
        .run(&program, Scope::new())
        .expect_err("open must be refused at run time");
    assert!(matches!(
        err,
        EvaluationError::ForbiddenCapability { capability } if capability == "open"
    ));
}

#[test]
fn safe_validators_still_load() -> Result<()> {
    let manager = restricted();
    let source = "import string\nif value[0] not in string.ascii_letters:\n    raise ValueError('Must start with a letter')";
    manager.load_schema(&document_with_validator(source))?;

    assert!(manager.validate(&json!({"value": "abc"}), "Probe")?.valid);
    let results = manager.validate(&json!({"value": "1bc"}), "Probe")?;
    assert_eq!(results.errors[0].message, "Must start with a letter");
    Ok(())
}
