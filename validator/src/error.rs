use thiserror::Error;

/// Problems with the schema itself, as opposed to the instance.
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The schema failed to compile: a bad `$ref`, pattern or keyword value.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}
