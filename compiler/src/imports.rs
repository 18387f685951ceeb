//! Import resolution.
//!
//! Walks `import` declarations depth-first from a root module, loading each
//! distinct file once, and flattens the closure into a single ordered list of
//! declarations tagged with the namespace they were imported under.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::{
    error::SdlError,
    parser::parse_module,
    tokenizer::tokenize,
    types::{Declaration, ImportDecl, Module},
};

/// Import paths starting with this marker are relative to the project root.
pub const ROOT_MARKER: &str = "@/";
pub const SOURCE_EXTENSION: &str = "sdl";
pub const DEFAULT_ENTRY_FILE: &str = "index.sdl";

/// A declaration from the import closure, with the namespace it lives in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedDecl {
    /// `Some("a.b")` when reached through `import ... as a` then `as b`.
    pub namespace: Option<String>,
    /// Index of the (module, namespace) contribution this came from.
    pub unit:      usize,
    pub decl:      Declaration,
}

impl MergedDecl {
    /// Fully-qualified name of the declaration, if it declares one.
    pub fn qualified_name(&self) -> Option<String> {
        self.decl.name().map(|name| qualify(self.namespace.as_deref(), name))
    }
}

pub fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}.{}", ns, name),
        None => name.to_string(),
    }
}

/// Output of a resolution run.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub declarations: Vec<MergedDecl>,
    /// Every file read, in load order. Watch mode polls these.
    pub modules:      Vec<PathBuf>,
}

/// Parses one module's text. `label` is used in diagnostics.
pub fn parse_source(text: &str, path: &Path, label: &str) -> Result<Module, SdlError> {
    let tokens = tokenize(text, label)?;
    let declarations = parse_module(&tokens, label)?;
    Ok(Module {
        path: path.to_path_buf(),
        declarations,
    })
}

/// One resolver per compilation; `resolve` consumes it so the cache never
/// outlives the run.
pub struct ImportResolver {
    project_root:    PathBuf,
    entry_file_name: String,
    cache:           HashMap<PathBuf, Arc<Module>>,
    resolving:       Vec<PathBuf>,
    merged:          HashSet<(PathBuf, Option<String>)>,
    declarations:    Vec<MergedDecl>,
    modules:         Vec<PathBuf>,
}

impl ImportResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let project_root = fs::canonicalize(&project_root).unwrap_or(project_root);
        ImportResolver {
            project_root,
            entry_file_name: DEFAULT_ENTRY_FILE.to_string(),
            cache: HashMap::new(),
            resolving: Vec::new(),
            merged: HashSet::new(),
            declarations: Vec::new(),
            modules: Vec::new(),
        }
    }

    /// File loaded when an import names a directory.
    pub fn with_entry_file_name(mut self, name: impl Into<String>) -> Self {
        self.entry_file_name = name.into();
        self
    }

    /// Resolves the import closure of the file at `root`.
    pub fn resolve(mut self, root: &Path) -> Result<Resolution, SdlError> {
        let requested = root.display().to_string();
        let path = self.locate(root.to_path_buf(), &requested, None)?;
        let module = self.load(&path)?;
        self.walk(&path, None, module)?;
        Ok(self.finish())
    }

    /// Resolves the import closure of an in-memory root module. Relative
    /// imports are taken from the directory of `virtual_path`.
    pub fn resolve_source(mut self, text: &str, virtual_path: &Path) -> Result<Resolution, SdlError> {
        let label = self.display_name(virtual_path);
        let module = Arc::new(parse_source(text, virtual_path, &label)?);
        self.walk(virtual_path, None, module)?;
        Ok(self.finish())
    }

    fn finish(self) -> Resolution {
        debug!(
            modules = self.modules.len(),
            declarations = self.declarations.len(),
            "import closure resolved"
        );
        Resolution {
            declarations: self.declarations,
            modules:      self.modules,
        }
    }

    fn display_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.project_root)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    fn load(&mut self, path: &Path) -> Result<Arc<Module>, SdlError> {
        if let Some(module) = self.cache.get(path) {
            debug!(module = %self.display_name(path), "reusing cached module");
            return Ok(Arc::clone(module));
        }

        let label = self.display_name(path);
        debug!(module = %label, "parsing module");
        let text = fs::read_to_string(path).map_err(|e| SdlError::ModuleNotFound {
            path:     label.clone(),
            reason:   e.to_string(),
            location: None,
        })?;
        let module = Arc::new(parse_source(&text, path, &label)?);
        self.cache.insert(path.to_path_buf(), Arc::clone(&module));
        self.modules.push(path.to_path_buf());
        Ok(module)
    }

    fn walk(&mut self, path: &Path, namespace: Option<String>, module: Arc<Module>) -> Result<(), SdlError> {
        if !self.merged.insert((path.to_path_buf(), namespace.clone())) {
            return Ok(());
        }

        let unit = self.merged.len() - 1;
        for decl in &module.declarations {
            if matches!(decl, Declaration::Import(_)) {
                continue;
            }
            self.declarations.push(MergedDecl {
                namespace: namespace.clone(),
                unit,
                decl: decl.clone(),
            });
        }

        self.resolving.push(path.to_path_buf());
        for import in module.imports() {
            let target = self.locate_import(path, import)?;

            if let Some(start) = self.resolving.iter().position(|p| *p == target) {
                let mut cycle: Vec<String> = self.resolving[start..]
                    .iter()
                    .map(|p| self.display_name(p))
                    .collect();
                cycle.push(self.display_name(&target));
                return Err(SdlError::CircularImport { cycle });
            }

            let child_namespace = match &import.alias {
                Some(alias) => Some(qualify(namespace.as_deref(), alias)),
                None => None,
            };
            let child = self.load(&target)?;
            self.walk(&target, child_namespace, child)?;
        }
        self.resolving.pop();

        Ok(())
    }

    fn locate_import(&self, importer: &Path, import: &ImportDecl) -> Result<PathBuf, SdlError> {
        let candidate = match import.path.strip_prefix(ROOT_MARKER) {
            Some(rest) => self.project_root.join(rest),
            None => importer
                .parent()
                .unwrap_or(&self.project_root)
                .join(&import.path),
        };
        self.locate(candidate, &import.path, Some(import))
    }

    /// Applies the directory and missing-extension rules, then canonicalizes.
    fn locate(&self, mut candidate: PathBuf, requested: &str, import: Option<&ImportDecl>) -> Result<PathBuf, SdlError> {
        if candidate.is_dir() {
            candidate.push(&self.entry_file_name);
        } else if !candidate.exists() && candidate.extension().is_none() {
            candidate.set_extension(SOURCE_EXTENSION);
        }

        fs::canonicalize(&candidate).map_err(|e| SdlError::ModuleNotFound {
            path:     requested.to_string(),
            reason:   e.to_string(),
            location: import.map(|i| i.location.clone()),
        })
    }
}
