use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    bindings::{emit_type, BindingTarget, FieldContext, Target, GENERATED_HEADER},
    error::SdlError,
    registry::{ResolvedType, TypeDef, TypeId, TypeRegistry},
    types::Primitive,
    utils::{quote, to_pascal_case},
};

lazy_static! {
    static ref JS_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

fn property_key(name: &str) -> String {
    if JS_IDENTIFIER.is_match(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

/// TypeScript interfaces and string-literal union types. Every type
/// expression has a native form; only declaration names can collide.
#[derive(Debug, Default)]
pub struct TypeScriptBindings;

impl TypeScriptBindings {
    pub fn new() -> Self {
        TypeScriptBindings
    }
}

impl BindingTarget for TypeScriptBindings {
    fn target(&self) -> Target {
        Target::TypeScript
    }

    fn preamble(&self) -> Vec<String> {
        vec![GENERATED_HEADER.to_string(), "".to_string()]
    }

    fn type_identifier(&self, def: &TypeDef) -> String {
        to_pascal_case(&def.name)
    }

    /// Property keys are emitted verbatim (quoted when needed).
    fn field_identifier(&self, name: &str) -> String {
        name.to_string()
    }

    fn emit_primitive(&mut self, primitive: Primitive, _cx: &FieldContext) -> Result<String, SdlError> {
        Ok(match primitive {
            Primitive::Integer | Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Any => "unknown",
            Primitive::String
            | Primitive::DateTime
            | Primitive::Date
            | Primitive::Uri
            | Primitive::Email => "string",
        }
        .to_string())
    }

    fn emit_reference(&mut self, id: TypeId, cx: &FieldContext) -> Result<String, SdlError> {
        Ok(self.type_identifier(cx.definition(id)?))
    }

    fn emit_array(&mut self, item: &ResolvedType, cx: &FieldContext) -> Result<String, SdlError> {
        let inner = emit_type(self, item, cx)?;
        Ok(match item {
            ResolvedType::Union(_) | ResolvedType::Optional(_) => format!("({})[]", inner),
            _ => format!("{}[]", inner),
        })
    }

    fn emit_optional(&mut self, inner: &ResolvedType, cx: &FieldContext) -> Result<String, SdlError> {
        Ok(format!("{} | undefined", emit_type(self, inner, cx)?))
    }

    fn emit_union(&mut self, arms: &[ResolvedType], cx: &FieldContext) -> Result<String, SdlError> {
        let arms = arms
            .iter()
            .map(|arm| emit_type(self, arm, cx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(arms.join(" | "))
    }

    fn emit_enum(&mut self, def: &TypeDef, members: &[String]) -> Result<String, SdlError> {
        let literals = members.iter().map(|m| quote(m)).collect::<Vec<_>>();
        Ok(format!(
            "export type {} = {};\n",
            self.type_identifier(def),
            literals.join(" | ")
        ))
    }

    fn emit_record(&mut self, registry: &TypeRegistry, id: TypeId, def: &TypeDef) -> Result<String, SdlError> {
        let mut lines = vec![format!("export interface {} {{", self.type_identifier(def))];
        for field in def.fields() {
            let cx = FieldContext {
                registry,
                owner_id: id,
                owner: def,
                field,
            };
            // Optional fields use `?:` instead of `| undefined`.
            let ts_type = emit_type(self, field.type_.required(), &cx)?;
            let marker = if field.is_optional() { "?" } else { "" };
            lines.push(format!("  {}{}: {};", property_key(&field.name), marker, ts_type));
        }
        lines.push("}\n".to_string());
        Ok(lines.join("\n"))
    }
}
