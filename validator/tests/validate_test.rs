use brine_sdl_validator::{validate, Violation};
use serde_json::{json, Value};

fn agent_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Config",
        "type": "object",
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "mode": {"$ref": "#/definitions/Mode"},
            "temperature": {"type": "number", "minimum": 0, "maximum": 2},
            "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 2},
            "home": {"allOf": [{"$ref": "#/definitions/common.Address"}], "required": ["city"]},
            "parent": {"$ref": "#"},
            "id": {"anyOf": [{"type": "string"}, {"type": "integer"}]}
        },
        "required": ["name", "mode"],
        "additionalProperties": false,
        "definitions": {
            "Mode": {"type": "string", "enum": ["fast", "slow"]},
            "common.Address": {
                "type": "object",
                "properties": {
                    "city": {"type": "string"},
                    "zip": {"type": "string", "pattern": "^[0-9]{5}$"}
                },
                "additionalProperties": false
            }
        }
    })
}

fn constraints(violations: &[Violation]) -> Vec<(&str, &str)> {
    violations
        .iter()
        .map(|v| (v.path.as_str(), v.constraint.as_str()))
        .collect()
}

#[test]
fn test_valid_instance() {
    let instance = json!({
        "name": "bot",
        "mode": "fast",
        "temperature": 0.7,
        "tags": ["a"],
        "home": {"city": "Oslo", "zip": "01234"},
        "parent": {"name": "root", "mode": "slow"},
        "id": 42
    });
    assert_eq!(validate(&agent_schema(), &instance).unwrap(), vec![]);
}

#[test]
fn test_collects_every_violation() {
    let instance = json!({
        "mode": "medium",
        "temperature": 3,
        "tags": ["a", "b", 3],
        "extra": true
    });
    let violations = validate(&agent_schema(), &instance).unwrap();
    let found = constraints(&violations);
    assert!(found.contains(&("/name", "required")));
    assert!(found.contains(&("/mode", "enum")));
    assert!(found.contains(&("/temperature", "maximum")));
    assert!(found.contains(&("/tags", "maxItems")));
    assert!(found.contains(&("/tags/2", "type")));
    assert!(found.contains(&("/extra", "additionalProperties")));
    assert_eq!(violations.len(), 6);
}

#[test]
fn test_nested_refs() {
    let instance = json!({
        "name": "bot",
        "mode": "fast",
        "home": {"zip": "12"},
        "parent": {"name": "", "mode": "fast"}
    });
    let violations = validate(&agent_schema(), &instance).unwrap();
    let found = constraints(&violations);
    assert!(found.contains(&("/home/city", "required")));
    assert!(found.contains(&("/home/zip", "pattern")));
    assert!(found.contains(&("/parent/name", "minLength")));
    assert_eq!(violations.len(), 3);
}

#[test]
fn test_any_of_reports_once() {
    let instance = json!({"name": "bot", "mode": "fast", "id": 1.5});
    let violations = validate(&agent_schema(), &instance).unwrap();
    assert_eq!(constraints(&violations), vec![("/id", "anyOf")]);
    assert_eq!(violations[0].value, json!(1.5));
}

#[test]
fn test_exclusive_bounds() {
    let schema = json!({"type": "number", "exclusiveMinimum": 0, "exclusiveMaximum": 1});
    assert!(validate(&schema, &json!(0.5)).unwrap().is_empty());
    assert_eq!(validate(&schema, &json!(0)).unwrap()[0].constraint, "exclusiveMinimum");
    assert_eq!(validate(&schema, &json!(1)).unwrap()[0].constraint, "exclusiveMaximum");
}

#[test]
fn test_format_is_annotation() {
    let schema = json!({"type": "string", "format": "email"});
    assert!(validate(&schema, &json!("not an email")).unwrap().is_empty());
}

#[test]
fn test_length_counts_characters() {
    let schema = json!({"type": "string", "maxLength": 3});
    assert!(validate(&schema, &json!("åäö")).unwrap().is_empty());
}

#[test]
fn test_one_of_accepts_equal_numbers() {
    let schema = json!({
        "type": "object",
        "properties": {"ratio": {"type": "number", "enum": [1, 0.5]}}
    });
    assert!(validate(&schema, &json!({"ratio": 1.0})).unwrap().is_empty());
    let violations = validate(&schema, &json!({"ratio": 2})).unwrap();
    assert_eq!(constraints(&violations), vec![("/ratio", "enum")]);
}
