use std::collections::HashSet;

use crate::{
    bindings::{emit_type, BindingTarget, FieldContext, Target, GENERATED_HEADER},
    error::SdlError,
    registry::{ResolvedField, ResolvedType, TypeDef, TypeId, TypeRegistry},
    types::Primitive,
    utils::{to_pascal_case, to_snake_case},
};

/// Escapes Rust reserved keywords by suffixing with an underscore.
fn escape_rust_keyword(s: &str) -> String {
    let keywords = [
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else",
        "enum", "extern", "false", "fn", "for", "if", "impl",
        "in", "let", "loop", "match", "mod", "move", "mut",
        "pub", "ref", "return", "self", "Self", "static",
        "struct", "super", "trait", "true", "type", "unsafe",
        "use", "where", "while",
    ];
    if keywords.contains(&s) {
        format!("{}_", s)
    } else {
        s.to_string()
    }
}

/// Serde attribute restoring the schema name when the Rust identifier differs.
fn rename_attribute(original: &str, rust_name: &str) -> Option<String> {
    (original != rust_name).then(|| format!("    #[serde(rename = \"{}\")]", original))
}

/// Rust structs and enums with serde derives. Unions become
/// `#[serde(untagged)]` enums named after the owning type and field.
pub struct RustBindings {
    /// Nesting depth inside `Vec<..>`; references under a `Vec` need no `Box`.
    array_depth: usize,
    /// Union enums synthesized while emitting the current record.
    pending:     Vec<String>,
    /// Names of every union enum synthesized so far.
    unions:      HashSet<String>,
}

impl RustBindings {
    pub fn new() -> Self {
        RustBindings {
            array_depth: 0,
            pending:     Vec::new(),
            unions:      HashSet::new(),
        }
    }

    fn unsupported(&self, construct: String, cx: &FieldContext) -> SdlError {
        SdlError::UnsupportedTargetConstruct {
            target: Target::Rust.to_string(),
            construct,
            location: cx.field.location.clone(),
        }
    }

    /// Variant name for one union arm: `String`, `Address`, `AddressList`.
    fn variant_name(&self, arm: &ResolvedType, cx: &FieldContext) -> Result<String, SdlError> {
        Ok(match arm {
            ResolvedType::Primitive(p) => to_pascal_case(p.keyword()),
            ResolvedType::Range { kind, .. } => to_pascal_case(kind.primitive().keyword()),
            ResolvedType::Named(id) => to_pascal_case(&cx.definition(*id)?.name),
            ResolvedType::ArrayOf(item) => format!("{}List", self.variant_name(item, cx)?),
            ResolvedType::Optional(inner) => self.variant_name(inner, cx)?,
            ResolvedType::Union(_) => return Err(self.unsupported("a nested union".to_string(), cx)),
        })
    }

    fn emit_field(&mut self, registry: &TypeRegistry, id: TypeId, def: &TypeDef, field: &ResolvedField) -> Result<String, SdlError> {
        let cx = FieldContext {
            registry,
            owner_id: id,
            owner: def,
            field,
        };
        let rust_type = emit_type(self, &field.type_, &cx)?;
        let rust_name = self.field_identifier(&field.name);

        let mut lines = Vec::new();
        if let Some(attr) = rename_attribute(&field.name, &rust_name) {
            lines.push(attr);
        }
        lines.push(format!("    pub {}: {},", rust_name, rust_type));
        Ok(lines.join("\n"))
    }
}

impl Default for RustBindings {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingTarget for RustBindings {
    fn target(&self) -> Target {
        Target::Rust
    }

    fn preamble(&self) -> Vec<String> {
        vec![
            GENERATED_HEADER.to_string(),
            "".to_string(),
            "use serde::{Deserialize, Serialize};".to_string(),
            "use serde_with::skip_serializing_none;".to_string(),
            "".to_string(),
        ]
    }

    fn type_identifier(&self, def: &TypeDef) -> String {
        to_pascal_case(&def.name)
    }

    fn field_identifier(&self, name: &str) -> String {
        escape_rust_keyword(&to_snake_case(name))
    }

    fn emit_primitive(&mut self, primitive: Primitive, _cx: &FieldContext) -> Result<String, SdlError> {
        Ok(match primitive {
            Primitive::String
            | Primitive::DateTime
            | Primitive::Date
            | Primitive::Uri
            | Primitive::Email => "String",
            Primitive::Integer => "i64",
            Primitive::Number => "f64",
            Primitive::Boolean => "bool",
            Primitive::Any => "serde_json::Value",
        }
        .to_string())
    }

    fn emit_reference(&mut self, id: TypeId, cx: &FieldContext) -> Result<String, SdlError> {
        let name = to_pascal_case(&cx.definition(id)?.name);
        // A by-value cycle back to the owner would make the type infinitely sized.
        if self.array_depth == 0 && cx.registry.reaches_directly(id, cx.owner_id) {
            Ok(format!("Box<{}>", name))
        } else {
            Ok(name)
        }
    }

    fn emit_array(&mut self, item: &ResolvedType, cx: &FieldContext) -> Result<String, SdlError> {
        self.array_depth += 1;
        let item = emit_type(self, item, cx);
        self.array_depth -= 1;
        Ok(format!("Vec<{}>", item?))
    }

    fn emit_optional(&mut self, inner: &ResolvedType, cx: &FieldContext) -> Result<String, SdlError> {
        Ok(format!("Option<{}>", emit_type(self, inner, cx)?))
    }

    fn emit_union(&mut self, arms: &[ResolvedType], cx: &FieldContext) -> Result<String, SdlError> {
        let enum_name = format!("{}{}", self.type_identifier(cx.owner), to_pascal_case(&cx.field.name));
        if self.unions.contains(&enum_name) {
            return Err(self.unsupported(
                format!("a union on {}.{} (the generated enum {} is already used by another union)", cx.owner.name, cx.field.name, enum_name),
                cx,
            ));
        }
        if cx.registry.iter().any(|(_, def)| self.type_identifier(def) == enum_name) {
            return Err(self.unsupported(
                format!("a union on {}.{} (the generated enum {} collides with a declared type)", cx.owner.name, cx.field.name, enum_name),
                cx,
            ));
        }

        let mut variants: Vec<(String, String)> = Vec::with_capacity(arms.len());
        for arm in arms {
            let variant = self.variant_name(arm, cx)?;
            let rust_type = emit_type(self, arm, cx)?;
            if let Some((_, existing)) = variants.iter().find(|(v, t)| *v == variant || *t == rust_type) {
                return Err(self.unsupported(
                    format!("a union whose arms map to the same Rust type `{}`", existing),
                    cx,
                ));
            }
            variants.push((variant, rust_type));
        }

        let body = variants
            .iter()
            .map(|(variant, rust_type)| format!("    {}({}),", variant, rust_type))
            .collect::<Vec<_>>()
            .join("\n");
        self.unions.insert(enum_name.clone());
        self.pending.push(format!(
            "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n#[serde(untagged)]\npub enum {} {{\n{}\n}}\n",
            enum_name, body
        ));
        Ok(enum_name)
    }

    /// Unit-only enum; each variant is renamed back to its schema member.
    fn emit_enum(&mut self, def: &TypeDef, members: &[String]) -> Result<String, SdlError> {
        let enum_name = self.type_identifier(def);
        let mut seen: Vec<String> = Vec::new();
        let mut variants = Vec::new();

        for member in members {
            let variant_name = escape_rust_keyword(&to_pascal_case(member));
            if seen.contains(&variant_name) {
                return Err(SdlError::UnsupportedTargetConstruct {
                    target:    Target::Rust.to_string(),
                    construct: format!("enum members that both map to the variant {}::{}", enum_name, variant_name),
                    location:  def.location.clone(),
                });
            }
            if let Some(attr) = rename_attribute(member, &variant_name) {
                variants.push(attr);
            }
            variants.push(format!("    {},", variant_name));
            seen.push(variant_name);
        }

        Ok(format!(
            "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]\npub enum {} {{\n{}\n}}\n",
            enum_name,
            variants.join("\n")
        ))
    }

    /// Struct with `#[skip_serializing_none]` so absent optionals stay absent.
    fn emit_record(&mut self, registry: &TypeRegistry, id: TypeId, def: &TypeDef) -> Result<String, SdlError> {
        let struct_name = self.type_identifier(def);
        let mut fields = Vec::new();
        for field in def.fields() {
            fields.push(self.emit_field(registry, id, def, field)?);
        }

        let mut out = vec![format!(
            "#[skip_serializing_none]\n#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\npub struct {} {{\n{}\n}}\n",
            struct_name,
            fields.join("\n")
        )];
        out.append(&mut self.pending);
        Ok(out.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::generate_bindings;
    use crate::imports::{parse_source, MergedDecl};
    use std::path::Path;

    fn rust(text: &str) -> Result<String, SdlError> {
        let module = parse_source(text, Path::new("test.sdl"), "test.sdl")?;
        let decls: Vec<MergedDecl> = module
            .declarations
            .into_iter()
            .map(|decl| MergedDecl { namespace: None, unit: 0, decl })
            .collect();
        generate_bindings(&TypeRegistry::build(&decls)?, Target::Rust)
    }

    #[test]
    fn test_struct_fields() {
        let code = rust("type Person { name: string\n age: integer\n email?: string\n createdAt: datetime\n type: string }").unwrap();
        assert!(code.starts_with(GENERATED_HEADER));
        assert!(code.contains("#[skip_serializing_none]\n#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\npub struct Person {"));
        assert!(code.contains("    pub name: String,"));
        assert!(code.contains("    pub age: i64,"));
        assert!(code.contains("    pub email: Option<String>,"));
        assert!(code.contains("    #[serde(rename = \"createdAt\")]\n    pub created_at: String,"));
        assert!(code.contains("    #[serde(rename = \"type\")]\n    pub type_: String,"));
    }

    #[test]
    fn test_enum_variants() {
        let code = rust("enum Status { active, in_progress }").unwrap();
        assert!(code.contains("pub enum Status {"));
        assert!(code.contains("    #[serde(rename = \"active\")]\n    Active,"));
        assert!(code.contains("    #[serde(rename = \"in_progress\")]\n    InProgress,"));
    }

    #[test]
    fn test_colliding_enum_variants_are_rejected() {
        assert!(matches!(
            rust("enum Mode { in_progress, InProgress }"),
            Err(SdlError::UnsupportedTargetConstruct { .. })
        ));
    }

    #[test]
    fn test_recursion_is_boxed_only_when_direct() {
        let code = rust("type Node { children: Node[]\n parent?: Node\n peer?: Other }\ntype Other { back: Node }").unwrap();
        assert!(code.contains("    pub children: Vec<Node>,"));
        assert!(code.contains("    pub parent: Option<Box<Node>>,"));
        assert!(code.contains("    pub peer: Option<Box<Other>>,"));
        assert!(code.contains("    pub back: Box<Node>,"));
    }

    #[test]
    fn test_union_becomes_untagged_enum() {
        let code = rust("type Address { city: string }\ntype Person { contact: email | Address | string[] }").unwrap();
        assert!(code.contains("    pub contact: PersonContact,"));
        assert!(code.contains(
            "#[serde(untagged)]\npub enum PersonContact {\n    Email(String),\n    Address(Address),\n    StringList(Vec<String>),\n}"
        ));
    }

    #[test]
    fn test_union_enum_names_must_be_distinct() {
        match rust("type Ab { cD: string | integer }\ntype AbC { d: string | integer }") {
            Err(SdlError::UnsupportedTargetConstruct { construct, location, .. }) => {
                assert!(construct.contains("AbCD"), "{}", construct);
                assert_eq!(location.line, 2);
            }
            other => panic!("expected UnsupportedTargetConstruct, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_union_is_unsupported() {
        match rust("type Event { at: datetime | string }") {
            Err(SdlError::UnsupportedTargetConstruct { target, construct, .. }) => {
                assert_eq!(target, "rust");
                assert!(construct.contains("String"), "{}", construct);
            }
            other => panic!("expected UnsupportedTargetConstruct, got {:?}", other),
        }
    }
}
