//! brine-sdl
//!
//! Convenience front door over the SDL toolchain.
//!
//! - `compile_to_json` turns SDL source into a pretty-printed JSON Schema
//! - `validate_json` checks a JSON document against such a schema
//! - The compiler and validator crates are re-exported for finer control

pub use brine_sdl_compiler::error::SdlError;
pub use brine_sdl_compiler::{compile_schema, Compilation, Compiler, CompilerConfig, Target};
pub use brine_sdl_validator::{validate, ValidatorError, Violation};

/// Compile a single SDL module into a pretty-printed JSON Schema string.
pub fn compile_to_json(source: &str) -> Result<String, SdlError> {
    let (_, schema) = compile_schema(source)?;
    serde_json::to_string_pretty(&schema).map_err(|e| SdlError::Internal(e.to_string()))
}

/// Parse `instance` and check it against the JSON text of `schema`.
pub fn validate_json(schema: &str, instance: &str) -> Result<Vec<Violation>, SdlError> {
    let schema: serde_json::Value =
        serde_json::from_str(schema).map_err(|e| SdlError::Config(format!("schema: {}", e)))?;
    let instance: serde_json::Value =
        serde_json::from_str(instance).map_err(|e| SdlError::Config(format!("instance: {}", e)))?;
    validate(&schema, &instance).map_err(|e| SdlError::Internal(e.to_string()))
}

pub mod compiler {
    pub use brine_sdl_compiler::*;
}

pub mod validator {
    pub use brine_sdl_validator::*;
}
