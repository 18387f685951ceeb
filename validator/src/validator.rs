use std::fmt;

use jsonschema::error::ValidationErrorKind;
use jsonschema::ValidationError;
use serde::Serialize;
use serde_json::Value;

use crate::error::ValidatorError;

/// One failed check. `path` is a JSON pointer into the instance (`""` for
/// the root), `constraint` the schema keyword that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub path:       String,
    pub constraint: String,
    pub value:      Value,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: failed {} (value {})", path, self.constraint, self.value)
    }
}

/// Checks `instance` against `schema`. An empty list means the instance is
/// valid; `Err` means the schema itself could not be compiled.
///
/// `format` is an annotation only, matching what the compiler promises.
pub fn validate(schema: &Value, instance: &Value) -> Result<Vec<Violation>, ValidatorError> {
    let validator = jsonschema::options()
        .should_validate_formats(false)
        .build(schema)
        .map_err(|e| ValidatorError::InvalidSchema(e.to_string()))?;

    let mut violations = Vec::new();
    for error in validator.iter_errors(instance) {
        push_violations(&error, &mut violations);
    }
    Ok(violations)
}

fn push_pointer(path: &str, segment: &str) -> String {
    format!("{}/{}", path, segment.replace('~', "~0").replace('/', "~1"))
}

/// Last segment of the schema path, i.e. the keyword that failed.
fn keyword(error: &ValidationError) -> String {
    let schema_path = error.schema_path.to_string();
    match schema_path.rsplit('/').next() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => "false".to_string(),
    }
}

/// Member-level keywords are reported against the member, not the object.
fn push_violations(error: &ValidationError, out: &mut Vec<Violation>) {
    let path = error.instance_path.to_string();
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let name = match property {
                Value::String(name) => name.clone(),
                other => other.to_string(),
            };
            out.push(Violation {
                path:       push_pointer(&path, &name),
                constraint: "required".to_string(),
                value:      Value::Null,
            });
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            for name in unexpected {
                out.push(Violation {
                    path:       push_pointer(&path, name),
                    constraint: "additionalProperties".to_string(),
                    value:      error.instance.get(name).cloned().unwrap_or(Value::Null),
                });
            }
        }
        _ => out.push(Violation {
            path,
            constraint: keyword(error),
            value: error.instance.clone().into_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_type() {
        let schema = json!({"type": "integer"});
        assert!(validate(&schema, &json!(3)).unwrap().is_empty());
        assert!(validate(&schema, &json!(3.0)).unwrap().is_empty());
        assert_eq!(validate(&schema, &json!(3.5)).unwrap()[0].constraint, "type");
        assert_eq!(validate(&schema, &json!("3")).unwrap()[0].constraint, "type");
    }

    #[test]
    fn test_enum_compares_numbers_by_value() {
        let schema = json!({"type": "number", "enum": [1, 2.5]});
        assert!(validate(&schema, &json!(1.0)).unwrap().is_empty());
        assert!(validate(&schema, &json!(2.5)).unwrap().is_empty());
        assert_eq!(validate(&schema, &json!(2)).unwrap()[0].constraint, "enum");
    }

    #[test]
    fn test_type_mismatch_skips_shape_keywords() {
        let schema = json!({"type": "string", "minLength": 3});
        let violations = validate(&schema, &json!(7)).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint, "type");
    }

    #[test]
    fn test_pointer_escaping() {
        let schema = json!({"properties": {"a/b": {"type": "string"}}});
        let violations = validate(&schema, &json!({"a/b": 1})).unwrap();
        assert_eq!(violations[0].path, "/a~1b");
    }

    #[test]
    fn test_unresolved_ref() {
        let schema = json!({"$ref": "#/definitions/Missing"});
        assert!(matches!(validate(&schema, &json!({})), Err(ValidatorError::InvalidSchema(_))));
    }

    #[test]
    fn test_invalid_pattern() {
        let schema = json!({"type": "string", "pattern": "("});
        assert!(matches!(validate(&schema, &json!("x")), Err(ValidatorError::InvalidSchema(_))));
    }

    #[test]
    fn test_display() {
        let v = Violation {
            path:       String::new(),
            constraint: "type".to_string(),
            value:      json!(1),
        };
        assert_eq!(v.to_string(), "/: failed type (value 1)");
    }
}
