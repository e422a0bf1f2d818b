//! Error types shared by the canonicalization engine

use crate::schema::SchemaError;

/// Errors that abort fixing or checking a single file
#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error("Failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Schema lookup failed for {path}: {source}")]
    Schema {
        path: String,
        #[source]
        source: SchemaError,
    },

    #[error("Inconsistent source layout at byte {offset}: {message}")]
    Layout { offset: usize, message: String },

    #[error("Invalid exclude pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FixError {
    pub(crate) fn layout(offset: usize, message: impl Into<String>) -> Self {
        FixError::Layout {
            offset,
            message: message.into(),
        }
    }
}
