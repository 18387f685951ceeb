//! brine-sdl-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for `.sdl` schema files,
//!  2) Import resolution (relative and `@/` root paths, aliases, cycle detection),
//!  3) A type registry linking every reference by id (duplicates, unresolved names, constraints),
//!  4) JSON Schema emission (`emit_schema`),
//!  5) Rust and TypeScript binding generation (`generate_bindings`),
//!  6) A schema compatibility diff, and the error type (`SdlError`).

pub mod error;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod parser;
pub mod imports;
pub mod registry;
pub mod gen_schema;
pub mod bindings;
pub mod compat;
pub mod compiler;

pub use bindings::{generate_all, generate_bindings, Target};
pub use compat::{diff_fields, CompatReport};
pub use compiler::{compile_schema, Compilation, Compiler, CompilerConfig};
pub use error::{Location, SdlError};
pub use gen_schema::emit_schema;
pub use registry::TypeRegistry;
