//! Static type bindings generated from a frozen `TypeRegistry`.
//!
//! Every target implements `BindingTarget`: one method per type expression
//! variant plus the two declaration forms. `generate_bindings` drives a target
//! over the registry in declaration order, so the output is a pure function
//! of the registry.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Location, SdlError},
    registry::{ResolvedField, ResolvedType, TypeDef, TypeDefKind, TypeId, TypeRegistry},
    types::Primitive,
    utils::quote,
};

pub mod gen_rust;
pub mod gen_typescript;

pub use gen_rust::RustBindings;
pub use gen_typescript::TypeScriptBindings;

pub const GENERATED_HEADER: &str = "// Code generated by bsdl. DO NOT EDIT.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Rust,
    TypeScript,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Rust, Target::TypeScript];

    pub fn name(self) -> &'static str {
        match self {
            Target::Rust => "rust",
            Target::TypeScript => "typescript",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Target::Rust => "rs",
            Target::TypeScript => "ts",
        }
    }

    fn emitter(self) -> Box<dyn BindingTarget> {
        match self {
            Target::Rust => Box::new(RustBindings::new()),
            Target::TypeScript => Box::new(TypeScriptBindings::new()),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = SdlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Target::Rust),
            "typescript" | "ts" => Ok(Target::TypeScript),
            _ => Err(SdlError::UnknownTarget(s.to_string())),
        }
    }
}

/// What an emitter needs to know about the field it is typing.
pub struct FieldContext<'a> {
    pub registry: &'a TypeRegistry,
    pub owner_id: TypeId,
    pub owner:    &'a TypeDef,
    pub field:    &'a ResolvedField,
}

impl<'a> FieldContext<'a> {
    pub fn definition(&self, id: TypeId) -> Result<&'a TypeDef, SdlError> {
        self.registry
            .get(id)
            .ok_or_else(|| SdlError::Internal(format!("dangling type id {}", id.0)))
    }
}

pub trait BindingTarget: Send {
    fn target(&self) -> Target;

    /// Preamble written once at the top of the file.
    fn preamble(&self) -> Vec<String>;

    /// Name a declaration is emitted under.
    fn type_identifier(&self, def: &TypeDef) -> String;
    /// Name a record field is emitted under.
    fn field_identifier(&self, name: &str) -> String;

    fn emit_primitive(&mut self, primitive: Primitive, cx: &FieldContext) -> Result<String, SdlError>;
    fn emit_reference(&mut self, id: TypeId, cx: &FieldContext) -> Result<String, SdlError>;
    fn emit_array(&mut self, item: &ResolvedType, cx: &FieldContext) -> Result<String, SdlError>;
    fn emit_optional(&mut self, inner: &ResolvedType, cx: &FieldContext) -> Result<String, SdlError>;
    fn emit_union(&mut self, arms: &[ResolvedType], cx: &FieldContext) -> Result<String, SdlError>;

    fn emit_enum(&mut self, def: &TypeDef, members: &[String]) -> Result<String, SdlError>;
    fn emit_record(&mut self, registry: &TypeRegistry, id: TypeId, def: &TypeDef) -> Result<String, SdlError>;
}

/// Dispatches a resolved type to the matching emitter method. Ranges are
/// typed as their underlying numeric primitive.
pub fn emit_type<T: BindingTarget + ?Sized>(
    target: &mut T,
    type_: &ResolvedType,
    cx: &FieldContext,
) -> Result<String, SdlError> {
    match type_ {
        ResolvedType::Primitive(p) => target.emit_primitive(*p, cx),
        ResolvedType::Range { kind, .. } => target.emit_primitive(kind.primitive(), cx),
        ResolvedType::Named(id) => target.emit_reference(*id, cx),
        ResolvedType::ArrayOf(item) => target.emit_array(item, cx),
        ResolvedType::Optional(inner) => target.emit_optional(inner, cx),
        ResolvedType::Union(arms) => target.emit_union(arms, cx),
    }
}

/// Generates the binding source for one target.
pub fn generate_bindings(registry: &TypeRegistry, target: Target) -> Result<String, SdlError> {
    let mut emitter = target.emitter();
    check_identifiers(registry, emitter.as_ref())?;
    let mut out = emitter.preamble();

    for (id, def) in registry.iter() {
        let block = match &def.kind {
            TypeDefKind::Enum { members } => emitter.emit_enum(def, members)?,
            TypeDefKind::Record { .. } => emitter.emit_record(registry, id, def)?,
        };
        out.push(block);
    }

    debug!(target = %target, definitions = registry.len(), "bindings generated");
    Ok(out.join("\n"))
}

/// Rejects registries where two declarations, or two fields of one record,
/// would share an identifier in the target language.
fn check_identifiers(registry: &TypeRegistry, emitter: &dyn BindingTarget) -> Result<(), SdlError> {
    let unsupported = |construct: String, location: &Location| SdlError::UnsupportedTargetConstruct {
        target: emitter.target().to_string(),
        construct,
        location: location.clone(),
    };

    let mut types: HashMap<String, &TypeDef> = HashMap::new();
    for (_, def) in registry.iter() {
        let ident = emitter.type_identifier(def);
        if let Some(previous) = types.get(&ident) {
            return Err(unsupported(
                format!("declarations {} and {} that both map to {}", quote(&previous.name), quote(&def.name), ident),
                &def.location,
            ));
        }
        types.insert(ident, def);

        let mut fields: HashMap<String, &ResolvedField> = HashMap::new();
        for field in def.fields() {
            let ident = emitter.field_identifier(&field.name);
            if let Some(previous) = fields.get(&ident) {
                return Err(unsupported(
                    format!(
                        "fields {} and {} of {} that both map to {}",
                        quote(&previous.name),
                        quote(&field.name),
                        quote(&def.name),
                        ident
                    ),
                    &field.location,
                ));
            }
            fields.insert(ident, field);
        }
    }
    Ok(())
}

/// Generates several targets over the same registry, one scoped thread per
/// target. Results come back in request order; the first failure wins.
pub fn generate_all(registry: &TypeRegistry, targets: &[Target]) -> Result<Vec<(Target, String)>, SdlError> {
    let results: Vec<Result<String, SdlError>> = thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|&target| scope.spawn(move || generate_bindings(registry, target)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(SdlError::Internal("binding emitter panicked".to_string())))
            })
            .collect()
    });

    targets
        .iter()
        .copied()
        .zip(results)
        .map(|(target, result)| result.map(|source| (target, source)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::imports::{parse_source, MergedDecl};
    use std::path::Path;

    fn registry(text: &str) -> TypeRegistry {
        let module = parse_source(text, Path::new("test.sdl"), "test.sdl").unwrap();
        let decls: Vec<MergedDecl> = module
            .declarations
            .into_iter()
            .map(|decl| MergedDecl { namespace: None, unit: 0, decl })
            .collect();
        TypeRegistry::build(&decls).unwrap()
    }

    #[test]
    fn test_generate_all_keeps_request_order() {
        let registry = registry("type Person { name: string }");
        let out = generate_all(&registry, &[Target::TypeScript, Target::Rust]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, Target::TypeScript);
        assert!(out[0].1.contains("export interface Person {"));
        assert_eq!(out[1].0, Target::Rust);
        assert!(out[1].1.contains("pub struct Person {"));
    }

    #[test]
    fn test_generate_all_surfaces_failing_target() {
        // TypeScript accepts the union; Rust cannot tell the arms apart.
        let registry = registry("type Event { at: datetime | string }");
        match generate_all(&registry, &[Target::TypeScript, Target::Rust]) {
            Err(SdlError::UnsupportedTargetConstruct { target, .. }) => assert_eq!(target, "rust"),
            other => panic!("expected UnsupportedTargetConstruct, got {:?}", other),
        }
    }

    #[test]
    fn test_declarations_sharing_an_identifier() {
        let registry = registry("type foo_bar { a: string }\ntype FooBar { b: string }");
        for target in Target::ALL {
            match generate_bindings(&registry, target) {
                Err(SdlError::UnsupportedTargetConstruct { construct, location, .. }) => {
                    assert!(construct.contains("FooBar"), "{}", construct);
                    assert_eq!(location.line, 2);
                }
                other => panic!("expected UnsupportedTargetConstruct, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_aliased_declaration_sharing_an_identifier() {
        let mut decls = Vec::new();
        for (unit, (text, namespace)) in [("type CommonTool { a: string }", None), ("type Tool { b: string }", Some("common"))]
            .into_iter()
            .enumerate()
        {
            let module = parse_source(text, Path::new("test.sdl"), "test.sdl").unwrap();
            decls.extend(module.declarations.into_iter().map(|decl| MergedDecl {
                namespace: namespace.map(str::to_string),
                unit,
                decl,
            }));
        }
        let registry = TypeRegistry::build(&decls).unwrap();
        assert!(matches!(
            generate_bindings(&registry, Target::Rust),
            Err(SdlError::UnsupportedTargetConstruct { .. })
        ));
    }

    #[test]
    fn test_fields_sharing_a_rust_identifier() {
        let registry = registry("type P { createdAt: string\n created_at: integer }");
        match generate_bindings(&registry, Target::Rust) {
            Err(SdlError::UnsupportedTargetConstruct { construct, location, .. }) => {
                assert!(construct.contains("created_at"), "{}", construct);
                assert_eq!(location.line, 2);
            }
            other => panic!("expected UnsupportedTargetConstruct, got {:?}", other),
        }
        // Property names are kept verbatim in TypeScript.
        assert!(generate_bindings(&registry, Target::TypeScript).is_ok());
    }

    #[test]
    fn test_target_from_str() {
        assert_eq!("rust".parse::<Target>().unwrap(), Target::Rust);
        assert_eq!("TS".parse::<Target>().unwrap(), Target::TypeScript);
        assert!(matches!("cobol".parse::<Target>(), Err(SdlError::UnknownTarget(_))));
    }
}
