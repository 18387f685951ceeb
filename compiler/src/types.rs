use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Location;

/// A parsed `.sdl` file. Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub path:         PathBuf,
    pub declarations: Vec<Declaration>,
}

impl Module {
    /// Import declarations in source order.
    pub fn imports(&self) -> impl Iterator<Item = &ImportDecl> {
        self.declarations.iter().filter_map(|decl| match decl {
            Declaration::Import(import) => Some(import),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Declaration {
    Import(ImportDecl),
    Enum(EnumDecl),
    Type(TypeDecl),
    Entry(TypeDecl),
    Validation(ValidationBlock),
}

impl Declaration {
    pub fn location(&self) -> &Location {
        match self {
            Declaration::Import(d) => &d.location,
            Declaration::Enum(d) => &d.location,
            Declaration::Type(d) | Declaration::Entry(d) => &d.location,
            Declaration::Validation(d) => &d.location,
        }
    }

    /// Declared name, for the declarations that introduce one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Enum(d) => Some(&d.name),
            Declaration::Type(d) | Declaration::Entry(d) => Some(&d.name),
            Declaration::Import(_) | Declaration::Validation(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportDecl {
    pub path:     String,
    pub alias:    Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumDecl {
    pub name:     String,
    pub members:  Vec<String>,
    pub location: Location,
}

/// Shared by `type` and `agent`/`entry` declarations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDecl {
    pub name:     String,
    pub fields:   Vec<Field>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name:     String,
    /// Wrapped in `TypeExpr::Optional` when the field was marked with `?`.
    pub type_:    TypeExpr,
    pub location: Location,
}

impl Field {
    pub fn is_optional(&self) -> bool {
        matches!(self.type_, TypeExpr::Optional(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeExpr {
    Primitive(Primitive),
    Reference(String),
    ArrayOf(Box<TypeExpr>),
    Optional(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Range {
        kind: NumericKind,
        min:  Option<f64>,
        max:  Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
    Any,
    DateTime,
    Date,
    Uri,
    Email,
}

impl Primitive {
    pub const ALL: [Primitive; 9] = [
        Primitive::String,
        Primitive::Integer,
        Primitive::Number,
        Primitive::Boolean,
        Primitive::Any,
        Primitive::DateTime,
        Primitive::Date,
        Primitive::Uri,
        Primitive::Email,
    ];

    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Number => "number",
            Primitive::Boolean => "boolean",
            Primitive::Any => "any",
            Primitive::DateTime => "datetime",
            Primitive::Date => "date",
            Primitive::Uri => "uri",
            Primitive::Email => "email",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Primitive> {
        Primitive::ALL.iter().copied().find(|p| p.keyword() == word)
    }

    pub fn numeric_kind(self) -> Option<NumericKind> {
        match self {
            Primitive::Integer => Some(NumericKind::Integer),
            Primitive::Number => Some(NumericKind::Number),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NumericKind {
    Integer,
    Number,
}

impl NumericKind {
    pub fn primitive(self) -> Primitive {
        match self {
            NumericKind::Integer => Primitive::Integer,
            NumericKind::Number => Primitive::Number,
        }
    }
}

/// `validate [Target] { key: call(args), ... }`. The calls stay opaque until
/// the registry links them against the closed constraint set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationBlock {
    pub target:   Option<String>,
    pub rules:    Vec<ValidationRule>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRule {
    /// A field name, or `self` for the annotated type.
    pub key:      String,
    pub calls:    Vec<ConstraintCall>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintCall {
    pub name:     String,
    pub args:     Vec<ConstraintArg>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstraintArg {
    String(String),
    Number(f64),
    Ident(String),
}

impl fmt::Display for ConstraintArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintArg::String(s) => write!(f, "{:?}", s),
            ConstraintArg::Number(n) => write!(f, "{}", n),
            ConstraintArg::Ident(i) => f.write_str(i),
        }
    }
}
