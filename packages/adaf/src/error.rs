//! Error types for the ADAF container

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdafError>;

#[derive(Error, Debug)]
pub enum AdafError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Can't create {what} of length {actual} in a table of length {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    #[error("Name '{0}' is reserved")]
    ReservedName(String),

    #[error("{kind} '{name}' already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Raster '{0}' has no basis")]
    MissingBasis(String),

    #[error("Column type error: {0}")]
    ColumnType(String),

    #[error("{group} missing Input Index {index}")]
    MissingIndex { group: &'static str, index: String },

    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Handle for {0} is closed")]
    HandleClosed(PathBuf),

    #[error("Handle for {path} can't be opened in {mode} mode through the link cache")]
    InvalidMode { path: PathBuf, mode: &'static str },

    #[error("Link cycle through {0}")]
    LinkCycle(PathBuf),

    #[error("{0}")]
    NotEqual(String),
}

impl AdafError {
    /// Stable machine-readable code, used by tooling output.
    pub fn code(&self) -> &'static str {
        match self {
            AdafError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            AdafError::ReservedName(_) => "RESERVED_NAME",
            AdafError::DuplicateName { .. } => "DUPLICATE_NAME",
            AdafError::NotFound { .. } => "NOT_FOUND",
            AdafError::MissingBasis(_) => "MISSING_BASIS",
            AdafError::ColumnType(_) => "COLUMN_TYPE",
            AdafError::MissingIndex { .. } => "MISSING_INDEX",
            AdafError::InvalidAttribute(_) => "INVALID_ATTRIBUTE",
            AdafError::InvalidFormat(_) => "INVALID_FORMAT",
            AdafError::HandleClosed(_) => "HANDLE_CLOSED",
            AdafError::InvalidMode { .. } => "INVALID_MODE",
            AdafError::LinkCycle(_) => "LINK_CYCLE",
            AdafError::NotEqual(_) => "NOT_EQUAL",
            _ => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        AdafError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, name: impl Into<String>) -> Self {
        AdafError::DuplicateName {
            kind,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(AdafError::ReservedName("x".into()).code(), "RESERVED_NAME");
        assert_eq!(AdafError::ColumnType("x".into()).code(), "COLUMN_TYPE");
        let io = AdafError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_missing_index_message() {
        let err = AdafError::MissingIndex {
            group: "Meta",
            index: "idx".into(),
        };
        assert_eq!(err.to_string(), "Meta missing Input Index idx");
    }
}
