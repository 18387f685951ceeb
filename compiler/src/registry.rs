//! Type registry: every enum, type and entry from the import closure, with all
//! references linked to stable ids.
//!
//! Built in two passes. The first assigns a `TypeId` to every declaration so
//! that the second can link self- and mutually-referential fields by id
//! instead of by inlining. The registry is read-only once `build` returns.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Location, SdlError},
    imports::{qualify, MergedDecl},
    types::{ConstraintArg, ConstraintCall, Declaration, NumericKind, Primitive, TypeDecl, TypeExpr, ValidationBlock},
    utils::quote,
};

/// Constraint functions accepted in `validate` blocks.
pub const CONSTRAINT_FUNCTIONS: [&str; 9] = [
    "pattern",
    "min_length",
    "max_length",
    "min",
    "max",
    "exclusive_min",
    "exclusive_max",
    "required",
    "one_of",
];

/// Rule key that targets the annotated type rather than one of its fields.
pub const SELF_KEY: &str = "self";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResolvedType {
    Primitive(Primitive),
    Named(TypeId),
    ArrayOf(Box<ResolvedType>),
    Optional(Box<ResolvedType>),
    Union(Vec<ResolvedType>),
    Range {
        kind: NumericKind,
        min:  Option<f64>,
        max:  Option<f64>,
    },
}

impl ResolvedType {
    /// Strips a top-level `Optional`.
    pub fn required(&self) -> &ResolvedType {
        match self {
            ResolvedType::Optional(inner) => inner.as_ref(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    String(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Constraint {
    Pattern(String),
    MinLength(u64),
    MaxLength(u64),
    Minimum(f64),
    Maximum(f64),
    ExclusiveMinimum(f64),
    ExclusiveMaximum(f64),
    Required(Vec<String>),
    OneOf(Vec<Literal>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedField {
    pub name:        String,
    pub type_:       ResolvedType,
    pub constraints: Vec<Constraint>,
    pub location:    Location,
}

impl ResolvedField {
    pub fn is_optional(&self) -> bool {
        matches!(self.type_, ResolvedType::Optional(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeDefKind {
    Enum {
        members: Vec<String>,
    },
    Record {
        fields:      Vec<ResolvedField>,
        /// Type-level constraints (`self: ...`).
        constraints: Vec<Constraint>,
        is_entry:    bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDef {
    /// Fully-qualified name (`alias.Name` for aliased imports).
    pub name:      String,
    pub namespace: Option<String>,
    pub location:  Location,
    pub kind:      TypeDefKind,
}

impl TypeDef {
    pub fn fields(&self) -> &[ResolvedField] {
        match &self.kind {
            TypeDefKind::Record { fields, .. } => fields,
            TypeDefKind::Enum { .. } => &[],
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct TypeRegistry {
    types: Vec<TypeDef>,
    #[serde(skip)]
    by_name: HashMap<String, TypeId>,
    entry: Option<TypeId>,
}

impl TypeRegistry {
    /// Declares, links and freezes the merged declaration set.
    pub fn build(decls: &[MergedDecl]) -> Result<TypeRegistry, SdlError> {
        let mut registry = TypeRegistry::default();
        let ids = registry.declare(decls)?;
        registry.link(decls, &ids)?;
        registry.link_validations(decls, &ids)?;
        debug!(
            types = registry.types.len(),
            entry = ?registry.entry.map(|id| registry.types[id.0].name.clone()),
            "type registry built"
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.types.get(id.0)
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// All definitions in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &TypeDef)> {
        self.types.iter().enumerate().map(|(i, def)| (TypeId(i), def))
    }

    pub fn entry(&self) -> Option<TypeId> {
        self.entry
    }

    /// Whether `from` can reach `to` through references that are not behind
    /// an array. Such cycles need indirection in by-value target languages.
    pub fn reaches_directly(&self, from: TypeId, to: TypeId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(def) = self.get(id) {
                for field in def.fields() {
                    direct_references(&field.type_, &mut stack);
                }
            }
        }
        false
    }

    fn lookup_scoped(&self, name: &str, namespace: Option<&str>) -> Option<TypeId> {
        if namespace.is_some() {
            if let Some(id) = self.lookup(&qualify(namespace, name)) {
                return Some(id);
            }
        }
        self.lookup(name)
    }

    /// Pass 1: one placeholder per declared name.
    fn declare(&mut self, decls: &[MergedDecl]) -> Result<Vec<Option<TypeId>>, SdlError> {
        let mut ids = Vec::with_capacity(decls.len());
        for merged in decls {
            let Some(name) = merged.qualified_name() else {
                ids.push(None);
                continue;
            };
            let location = merged.decl.location().clone();

            if Primitive::from_keyword(&name).is_some() {
                return Err(SdlError::DuplicateDeclaration {
                    name: quote(&name),
                    location,
                    previous: Location::new("<builtin>", 0, 0),
                });
            }
            if let Some(previous) = self.lookup(&name) {
                return Err(SdlError::DuplicateDeclaration {
                    name: quote(&name),
                    location,
                    previous: self.types[previous.0].location.clone(),
                });
            }

            let kind = match &merged.decl {
                Declaration::Enum(e) => TypeDefKind::Enum {
                    members: e.members.clone(),
                },
                Declaration::Entry(_) => {
                    if let Some(previous) = self.entry {
                        return Err(SdlError::MultipleEntries {
                            name: quote(&name),
                            previous: quote(&self.types[previous.0].name),
                            location,
                        });
                    }
                    self.entry = Some(TypeId(self.types.len()));
                    TypeDefKind::Record {
                        fields:      Vec::new(),
                        constraints: Vec::new(),
                        is_entry:    true,
                    }
                }
                _ => TypeDefKind::Record {
                    fields:      Vec::new(),
                    constraints: Vec::new(),
                    is_entry:    false,
                },
            };

            let id = TypeId(self.types.len());
            self.by_name.insert(name.clone(), id);
            self.types.push(TypeDef {
                name,
                namespace: merged.namespace.clone(),
                location,
                kind,
            });
            ids.push(Some(id));
        }
        Ok(ids)
    }

    /// Pass 2: replace every reference with the id of its declaration.
    fn link(&mut self, decls: &[MergedDecl], ids: &[Option<TypeId>]) -> Result<(), SdlError> {
        for (merged, id) in decls.iter().zip(ids) {
            let (Some(id), Declaration::Type(record) | Declaration::Entry(record)) = (id, &merged.decl) else {
                continue;
            };
            let fields = self.link_fields(record, merged.namespace.as_deref(), *id)?;
            if let TypeDefKind::Record { fields: slot, .. } = &mut self.types[id.0].kind {
                *slot = fields;
            }
        }
        Ok(())
    }

    fn link_fields(&self, record: &TypeDecl, namespace: Option<&str>, owner: TypeId) -> Result<Vec<ResolvedField>, SdlError> {
        record
            .fields
            .iter()
            .map(|field| {
                let type_ = self.link_type(&field.type_, namespace, &|name: &str| SdlError::UnresolvedReference {
                    name:     quote(name),
                    field:    quote(&field.name),
                    owner:    quote(&self.types[owner.0].name),
                    location: field.location.clone(),
                })?;
                Ok(ResolvedField {
                    name: field.name.clone(),
                    type_,
                    constraints: Vec::new(),
                    location: field.location.clone(),
                })
            })
            .collect()
    }

    fn link_type(
        &self,
        expr: &TypeExpr,
        namespace: Option<&str>,
        unresolved: &dyn Fn(&str) -> SdlError,
    ) -> Result<ResolvedType, SdlError> {
        Ok(match expr {
            TypeExpr::Primitive(p) => ResolvedType::Primitive(*p),
            TypeExpr::Reference(name) => match self.lookup_scoped(name, namespace) {
                Some(id) => ResolvedType::Named(id),
                None => return Err(unresolved(name)),
            },
            TypeExpr::ArrayOf(inner) => ResolvedType::ArrayOf(Box::new(self.link_type(inner, namespace, unresolved)?)),
            TypeExpr::Optional(inner) => ResolvedType::Optional(Box::new(self.link_type(inner, namespace, unresolved)?)),
            TypeExpr::Union(arms) => ResolvedType::Union(
                arms.iter()
                    .map(|arm| self.link_type(arm, namespace, unresolved))
                    .collect::<Result<_, _>>()?,
            ),
            TypeExpr::Range { kind, min, max } => ResolvedType::Range {
                kind: *kind,
                min:  *min,
                max:  *max,
            },
        })
    }

    /// Attaches validation blocks to their types, last so every field exists.
    fn link_validations(&mut self, decls: &[MergedDecl], ids: &[Option<TypeId>]) -> Result<(), SdlError> {
        let mut preceding: Option<(usize, TypeId)> = None;

        for (merged, id) in decls.iter().zip(ids) {
            match (&merged.decl, id) {
                (Declaration::Type(_) | Declaration::Entry(_), Some(id)) => {
                    preceding = Some((merged.unit, *id));
                }
                (Declaration::Validation(block), _) => {
                    let target = self.validation_target(block, merged, preceding)?;
                    self.apply_validation(block, target)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn validation_target(
        &self,
        block: &ValidationBlock,
        merged: &MergedDecl,
        preceding: Option<(usize, TypeId)>,
    ) -> Result<TypeId, SdlError> {
        let invalid = |msg: String| SdlError::InvalidConstraint {
            msg,
            location: block.location.clone(),
        };

        match &block.target {
            Some(name) => {
                let id = self
                    .lookup_scoped(name, merged.namespace.as_deref())
                    .ok_or_else(|| invalid(format!("validation target {} is not a declared type", quote(name))))?;
                match self.types[id.0].kind {
                    TypeDefKind::Record { .. } => Ok(id),
                    TypeDefKind::Enum { .. } => Err(invalid(format!("cannot attach validation to enum {}", quote(name)))),
                }
            }
            None => match preceding {
                Some((unit, id)) if unit == merged.unit => Ok(id),
                _ => Err(invalid("validation block has no preceding type to attach to".to_string())),
            },
        }
    }

    fn apply_validation(&mut self, block: &ValidationBlock, target: TypeId) -> Result<(), SdlError> {
        for rule in &block.rules {
            let def = &self.types[target.0];
            let field_index = if rule.key == SELF_KEY {
                None
            } else {
                match def.fields().iter().position(|f| f.name == rule.key) {
                    Some(index) => Some(index),
                    None => {
                        return Err(SdlError::InvalidConstraint {
                            msg:      format!("{} has no field named {}", quote(&def.name), quote(&rule.key)),
                            location: rule.location.clone(),
                        })
                    }
                }
            };

            let mut constraints = Vec::with_capacity(rule.calls.len());
            for call in &rule.calls {
                constraints.push(link_constraint(call, field_index.is_none(), def)?);
            }

            if let TypeDefKind::Record {
                fields,
                constraints: record_constraints,
                ..
            } = &mut self.types[target.0].kind
            {
                match field_index {
                    Some(index) => fields[index].constraints.extend(constraints),
                    None => record_constraints.extend(constraints),
                }
            }
        }
        Ok(())
    }
}

fn direct_references(type_: &ResolvedType, out: &mut Vec<TypeId>) {
    match type_ {
        ResolvedType::Named(id) => out.push(*id),
        ResolvedType::Optional(inner) => direct_references(inner, out),
        ResolvedType::Union(arms) => arms.iter().for_each(|arm| direct_references(arm, out)),
        ResolvedType::ArrayOf(_) | ResolvedType::Primitive(_) | ResolvedType::Range { .. } => {}
    }
}

/// Maps one opaque call onto the closed `Constraint` set.
fn link_constraint(call: &ConstraintCall, on_self: bool, owner: &TypeDef) -> Result<Constraint, SdlError> {
    let invalid = |msg: String| SdlError::InvalidConstraint {
        msg,
        location: call.location.clone(),
    };

    if !CONSTRAINT_FUNCTIONS.contains(&call.name.as_str()) {
        return Err(SdlError::UnknownConstraint {
            function: quote(&call.name),
            location: call.location.clone(),
        });
    }
    if on_self != (call.name == "required") {
        return Err(invalid(if on_self {
            format!("{} applies to a field, not to \"self\"", quote(&call.name))
        } else {
            "\"required\" applies to \"self\", not to a field".to_string()
        }));
    }

    let single_number = || -> Result<f64, SdlError> {
        match call.args.as_slice() {
            [ConstraintArg::Number(n)] => Ok(*n),
            _ => Err(invalid(format!("{} takes one number", quote(&call.name)))),
        }
    };
    let single_length = || -> Result<u64, SdlError> {
        match call.args.as_slice() {
            [ConstraintArg::Number(n)] if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as u64),
            _ => Err(invalid(format!("{} takes one non-negative integer", quote(&call.name)))),
        }
    };

    Ok(match call.name.as_str() {
        "pattern" => match call.args.as_slice() {
            [ConstraintArg::String(pattern)] => {
                Regex::new(pattern).map_err(|e| invalid(format!("invalid pattern {}: {}", quote(pattern), e)))?;
                Constraint::Pattern(pattern.clone())
            }
            _ => return Err(invalid("\"pattern\" takes one string".to_string())),
        },
        "min_length" => Constraint::MinLength(single_length()?),
        "max_length" => Constraint::MaxLength(single_length()?),
        "min" => Constraint::Minimum(single_number()?),
        "max" => Constraint::Maximum(single_number()?),
        "exclusive_min" => Constraint::ExclusiveMinimum(single_number()?),
        "exclusive_max" => Constraint::ExclusiveMaximum(single_number()?),
        "required" => {
            if call.args.is_empty() {
                return Err(invalid("\"required\" takes at least one field name".to_string()));
            }
            let mut names = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                let name = match arg {
                    ConstraintArg::Ident(name) | ConstraintArg::String(name) => name,
                    ConstraintArg::Number(_) => return Err(invalid("\"required\" takes field names".to_string())),
                };
                if !owner.fields().iter().any(|f| &f.name == name) {
                    return Err(invalid(format!("{} has no field named {}", quote(&owner.name), quote(name))));
                }
                names.push(name.clone());
            }
            Constraint::Required(names)
        }
        "one_of" => {
            if call.args.is_empty() {
                return Err(invalid("\"one_of\" takes at least one value".to_string()));
            }
            Constraint::OneOf(
                call.args
                    .iter()
                    .map(|arg| match arg {
                        ConstraintArg::String(s) | ConstraintArg::Ident(s) => Literal::String(s.clone()),
                        ConstraintArg::Number(n) => Literal::Number(*n),
                    })
                    .collect(),
            )
        }
        other => {
            return Err(SdlError::UnknownConstraint {
                function: quote(other),
                location: call.location.clone(),
            })
        }
    })
}
