use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Where in the source a diagnostic points: module path plus 1-based line/column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub module: String,
    pub line:   usize,
    pub column: usize,
}

impl Location {
    pub fn new(module: impl Into<String>, line: usize, column: usize) -> Self {
        Location {
            module: module.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module, self.line, self.column)
    }
}

#[derive(Debug, Error)]
pub enum SdlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{location}: unexpected character(s) {text}")]
    LexError {
        text:     String,
        location: Location,
    },

    #[error("{location}: unterminated string literal")]
    UnterminatedString { location: Location },

    #[error("{location}: syntax error: found {found}, expected {expected}")]
    SyntaxError {
        found:    String,
        expected: String,
        location: Location,
    },

    #[error("{}module {path} not found: {reason}", prefix(.location))]
    ModuleNotFound {
        path:     String,
        reason:   String,
        location: Option<Location>,
    },

    #[error("circular import: {}", .cycle.join(" -> "))]
    CircularImport { cycle: Vec<String> },

    #[error("{location}: the type {name} is declared twice (previous declaration at {previous})")]
    DuplicateDeclaration {
        name:     String,
        location: Location,
        previous: Location,
    },

    #[error("{location}: entry {name} conflicts with entry {previous}; only one entry is allowed")]
    MultipleEntries {
        name:     String,
        previous: String,
        location: Location,
    },

    #[error("{location}: the type {name} is not defined for field {field} of {owner}")]
    UnresolvedReference {
        name:     String,
        field:    String,
        owner:    String,
        location: Location,
    },

    #[error("{location}: unknown constraint function {function}")]
    UnknownConstraint {
        function: String,
        location: Location,
    },

    #[error("{location}: invalid constraint: {msg}")]
    InvalidConstraint {
        msg:      String,
        location: Location,
    },

    #[error("{location}: conflicting values for {keyword} on {target}")]
    ConflictingConstraint {
        target:   String,
        keyword:  String,
        location: Location,
    },

    #[error("{location}: the {target} target cannot express {construct}")]
    UnsupportedTargetConstruct {
        target:    String,
        construct: String,
        location:  Location,
    },

    #[error("unknown binding target \"{0}\"")]
    UnknownTarget(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal compiler error: {0}")]
    Internal(String),
}

fn prefix(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!("{}: ", loc),
        None => String::new(),
    }
}

pub type Result<T, E = SdlError> = std::result::Result<T, E>;
