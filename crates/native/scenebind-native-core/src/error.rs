use thiserror::Error;

/// Errors raised by the native runtime while loading catalogs or creating
/// containers. Field reads and writes never produce errors; they report
/// failure through `Option`/`bool` like the toolkit API they model.
#[derive(Debug, Error)]
pub enum NativeError {
    #[error("catalog parse error: {0}")]
    CatalogParse(String),
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("type '{0}' is already registered")]
    DuplicateType(String),
    #[error("type '{name}' is not a {expected} type")]
    WrongTypeClass { name: String, expected: &'static str },
    #[error("type '{0}' cannot be instantiated")]
    NotCreatable(String),
    #[error("invalid catalog entry '{name}': {reason}")]
    InvalidCatalog { name: String, reason: String },
}
