use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{
    bindings::{generate_all, Target},
    error::SdlError,
    gen_schema::emit_schema,
    imports::{ImportResolver, Resolution, DEFAULT_ENTRY_FILE},
    registry::TypeRegistry,
};

/// Settings for one compiler invocation. Loadable from JSON; CLI flags
/// override individual fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Base for `@/` imports. Defaults to the root module's directory.
    pub project_root:    Option<PathBuf>,
    /// Binding targets to generate alongside the schema.
    pub targets:         Vec<Target>,
    /// File loaded when an import names a directory.
    pub entry_file_name: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            project_root:    None,
            targets:         Vec::new(),
            entry_file_name: DEFAULT_ENTRY_FILE.to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, SdlError> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| SdlError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Everything one run produces. Nothing is written to disk here.
#[derive(Debug)]
pub struct Compilation {
    pub registry: TypeRegistry,
    pub schema:   Value,
    pub bindings: Vec<(Target, String)>,
    /// Source files read during the run.
    pub modules:  Vec<PathBuf>,
}

/// Stateless between runs: every call builds a fresh import cache and registry.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Compiler { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    fn resolver(&self, fallback_root: &Path) -> ImportResolver {
        let root = self
            .config
            .project_root
            .clone()
            .unwrap_or_else(|| fallback_root.to_path_buf());
        ImportResolver::new(root).with_entry_file_name(self.config.entry_file_name.clone())
    }

    /// Compiles the module at `path` and its import closure.
    pub fn compile_file(&self, path: &Path) -> Result<Compilation, SdlError> {
        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base = if path.is_dir() { path.to_path_buf() } else { base };
        let resolution = self.resolver(&base).resolve(path)?;
        self.finish(resolution)
    }

    /// Compiles in-memory source. Imports are resolved against the project
    /// root (or the current directory).
    pub fn compile_source(&self, text: &str) -> Result<Compilation, SdlError> {
        let base = self
            .config
            .project_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let base = fs::canonicalize(&base).unwrap_or(base);
        let resolver = self.resolver(&base);
        let resolution = resolver.resolve_source(text, &base.join("<input>.sdl"))?;
        self.finish(resolution)
    }

    fn finish(&self, resolution: Resolution) -> Result<Compilation, SdlError> {
        let registry = TypeRegistry::build(&resolution.declarations)?;
        let schema = emit_schema(&registry)?;
        let bindings = generate_all(&registry, &self.config.targets)?;
        info!(
            modules = resolution.modules.len(),
            types = registry.len(),
            targets = bindings.len(),
            "compilation finished"
        );
        Ok(Compilation {
            registry,
            schema,
            bindings,
            modules: resolution.modules,
        })
    }
}

/// Compile a textual schema into `(TypeRegistry, schema document)`.
/// Returns `Err(SdlError)` if any phase fails.
pub fn compile_schema(text: &str) -> Result<(TypeRegistry, Value), SdlError> {
    let compilation = Compiler::default().compile_source(text)?;
    Ok((compilation.registry, compilation.schema))
}
