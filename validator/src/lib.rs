//! Instance validation against schema documents emitted by the SDL compiler.
//!
//! Schemas are compiled with the `jsonschema` crate; its errors are flattened
//! into [`Violation`]s keyed by instance pointer and failing keyword.
//! `format` is treated as an annotation.
//!
//! ```
//! use brine_sdl_validator::validate;
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {"name": {"type": "string", "minLength": 1}},
//!     "required": ["name"],
//! });
//! assert!(validate(&schema, &json!({"name": "ada"})).unwrap().is_empty());
//!
//! let violations = validate(&schema, &json!({"name": ""})).unwrap();
//! assert_eq!(violations[0].path, "/name");
//! assert_eq!(violations[0].constraint, "minLength");
//! ```

pub mod error;
pub mod validator;

pub use error::ValidatorError;
pub use validator::{validate, Violation};
