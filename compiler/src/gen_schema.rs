use serde_json::{json, Map, Value};

use crate::{
    error::{Location, SdlError},
    registry::{Constraint, Literal, ResolvedField, ResolvedType, TypeDef, TypeDefKind, TypeId, TypeRegistry},
    types::Primitive,
};

pub const SCHEMA_DIALECT: &str = "http://json-schema.org/draft-07/schema#";

/// Emits the validation schema for a frozen registry.
///
/// The entry record becomes the root object; every other enum and type is a
/// named entry under `definitions` and is referenced with `$ref`, so recursive
/// types stay finite. Output order follows declaration order.
pub fn emit_schema(registry: &TypeRegistry) -> Result<Value, SdlError> {
    let emitter = SchemaEmitter { registry };
    let entry = registry.entry();

    let mut root = Map::new();
    root.insert("$schema".to_string(), json!(SCHEMA_DIALECT));

    if let Some(entry) = entry {
        let def = emitter.definition(entry)?;
        root.insert("title".to_string(), json!(def.name));
        for (key, value) in emitter.emit_definition(def)? {
            root.insert(key, value);
        }
    }

    let mut definitions = Map::new();
    for (id, def) in registry.iter() {
        if Some(id) == entry {
            continue;
        }
        definitions.insert(def.name.clone(), Value::Object(emitter.emit_definition(def)?));
    }
    root.insert("definitions".to_string(), Value::Object(definitions));

    Ok(Value::Object(root))
}

/// JSON numbers for bounds: whole values print as integers.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

pub fn primitive_schema(primitive: Primitive) -> Map<String, Value> {
    let (type_, format) = match primitive {
        Primitive::String => (Some("string"), None),
        Primitive::Integer => (Some("integer"), None),
        Primitive::Number => (Some("number"), None),
        Primitive::Boolean => (Some("boolean"), None),
        Primitive::Any => (None, None),
        Primitive::DateTime => (Some("string"), Some("date-time")),
        Primitive::Date => (Some("string"), Some("date")),
        Primitive::Uri => (Some("string"), Some("uri")),
        Primitive::Email => (Some("string"), Some("email")),
    };
    let mut schema = Map::new();
    if let Some(type_) = type_ {
        schema.insert("type".to_string(), json!(type_));
    }
    if let Some(format) = format {
        schema.insert("format".to_string(), json!(format));
    }
    schema
}

struct SchemaEmitter<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> SchemaEmitter<'a> {
    fn definition(&self, id: TypeId) -> Result<&'a TypeDef, SdlError> {
        self.registry
            .get(id)
            .ok_or_else(|| SdlError::Internal(format!("dangling type id {}", id.0)))
    }

    fn emit_definition(&self, def: &TypeDef) -> Result<Map<String, Value>, SdlError> {
        match &def.kind {
            TypeDefKind::Enum { members } => {
                let mut schema = Map::new();
                schema.insert("type".to_string(), json!("string"));
                schema.insert("enum".to_string(), json!(members));
                Ok(schema)
            }
            TypeDefKind::Record { fields, constraints, .. } => self.emit_record(def, fields, constraints),
        }
    }

    fn emit_record(
        &self,
        def: &TypeDef,
        fields: &[ResolvedField],
        constraints: &[Constraint],
    ) -> Result<Map<String, Value>, SdlError> {
        let mut also_required: Vec<&str> = Vec::new();
        for constraint in constraints {
            match constraint {
                Constraint::Required(names) => also_required.extend(names.iter().map(String::as_str)),
                other => {
                    return Err(SdlError::Internal(format!(
                        "type-level constraint {:?} on {}",
                        other, def.name
                    )))
                }
            }
        }

        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in fields {
            properties.insert(field.name.clone(), Value::Object(self.emit_field(def, field)?));
            if !field.is_optional() || also_required.contains(&field.name.as_str()) {
                required.push(json!(field.name));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        schema.insert("additionalProperties".to_string(), json!(false));
        Ok(schema)
    }

    fn emit_field(&self, owner: &TypeDef, field: &ResolvedField) -> Result<Map<String, Value>, SdlError> {
        let base = field.type_.required();
        let mut schema = self.emit_type(base)?;
        if field.constraints.is_empty() {
            return Ok(schema);
        }

        // Keywords next to `$ref` are ignored by draft-07 validators.
        if schema.contains_key("$ref") {
            let mut wrapper = Map::new();
            wrapper.insert("allOf".to_string(), json!([Value::Object(schema)]));
            schema = wrapper;
        }

        let target = format!("{}.{}", owner.name, field.name);
        let is_array = matches!(base, ResolvedType::ArrayOf(_));
        for constraint in &field.constraints {
            let (keyword, value) = constraint_keyword(constraint, is_array);
            merge_keyword(&mut schema, keyword, value, &target, &field.location)?;
        }
        Ok(schema)
    }

    fn emit_type(&self, type_: &ResolvedType) -> Result<Map<String, Value>, SdlError> {
        let mut schema = Map::new();
        match type_ {
            ResolvedType::Primitive(p) => return Ok(primitive_schema(*p)),
            ResolvedType::Named(id) => {
                let def = self.definition(*id)?;
                let pointer = if Some(*id) == self.registry.entry() {
                    "#".to_string()
                } else {
                    format!("#/definitions/{}", def.name)
                };
                schema.insert("$ref".to_string(), json!(pointer));
            }
            ResolvedType::ArrayOf(item) => {
                schema.insert("type".to_string(), json!("array"));
                schema.insert("items".to_string(), Value::Object(self.emit_type(item)?));
            }
            ResolvedType::Optional(inner) => return self.emit_type(inner),
            ResolvedType::Union(arms) => {
                let arms = arms
                    .iter()
                    .map(|arm| self.emit_type(arm).map(Value::Object))
                    .collect::<Result<Vec<_>, _>>()?;
                schema.insert("anyOf".to_string(), Value::Array(arms));
            }
            ResolvedType::Range { kind, min, max } => {
                schema = primitive_schema(kind.primitive());
                if let Some(min) = min {
                    schema.insert("minimum".to_string(), number_value(*min));
                }
                if let Some(max) = max {
                    schema.insert("maximum".to_string(), number_value(*max));
                }
            }
        }
        Ok(schema)
    }
}

fn constraint_keyword(constraint: &Constraint, is_array: bool) -> (&'static str, Value) {
    match constraint {
        Constraint::Pattern(p) => ("pattern", json!(p)),
        Constraint::MinLength(n) if is_array => ("minItems", json!(n)),
        Constraint::MinLength(n) => ("minLength", json!(n)),
        Constraint::MaxLength(n) if is_array => ("maxItems", json!(n)),
        Constraint::MaxLength(n) => ("maxLength", json!(n)),
        Constraint::Minimum(n) => ("minimum", number_value(*n)),
        Constraint::Maximum(n) => ("maximum", number_value(*n)),
        Constraint::ExclusiveMinimum(n) => ("exclusiveMinimum", number_value(*n)),
        Constraint::ExclusiveMaximum(n) => ("exclusiveMaximum", number_value(*n)),
        Constraint::Required(names) => ("required", json!(names)),
        Constraint::OneOf(values) => (
            "enum",
            Value::Array(
                values
                    .iter()
                    .map(|v| match v {
                        Literal::String(s) => json!(s),
                        Literal::Number(n) => number_value(*n),
                    })
                    .collect(),
            ),
        ),
    }
}

fn merge_keyword(
    schema: &mut Map<String, Value>,
    keyword: &str,
    value: Value,
    target: &str,
    location: &Location,
) -> Result<(), SdlError> {
    match schema.get(keyword) {
        Some(existing) if *existing != value => Err(SdlError::ConflictingConstraint {
            target:   target.to_string(),
            keyword:  keyword.to_string(),
            location: location.clone(),
        }),
        _ => {
            schema.insert(keyword.to_string(), value);
            Ok(())
        }
    }
}
