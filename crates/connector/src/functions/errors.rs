use thiserror::Error;

/// Errors raised by a function body.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum FunctionError {
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("execution failed: {0}")]
    Execution(String),
}

impl FunctionError {
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(name: impl Into<String>) -> Self {
        Self::invalid_argument(name, "missing")
    }
}

/// Errors decoding a function definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("definition is not an object")]
    NotAnObject,
    #[error("definition field {0} is missing or has the wrong type")]
    Field(&'static str),
    #[error("unknown parameter type {0}")]
    UnknownType(String),
}
