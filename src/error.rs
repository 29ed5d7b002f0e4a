//! Error types for Epiform

use thiserror::Error;

/// Errors that can occur while parsing formulas and building design matrices
#[derive(Debug, Error)]
pub enum TermError {
    #[error("Invalid formula: {0}")]
    InvalidFormula(String),

    #[error("Invalid random walk term '{label}': {reason}")]
    InvalidTerm { label: String, reason: String },

    #[error("Unknown column '{column}' referenced by term '{label}'")]
    UnknownColumn { label: String, column: String },

    #[error("Row count mismatch for term '{label}': expected {expected} rows, got {actual}")]
    RowCountMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TermError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            TermError::InvalidFormula(_) => "INVALID_FORMULA",
            TermError::InvalidTerm { .. } => "INVALID_TERM",
            TermError::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            TermError::RowCountMismatch { .. } => "ROW_COUNT_MISMATCH",
            TermError::InvalidDataset(_) => "INVALID_DATASET",
            TermError::InvalidConfig(_) => "INVALID_CONFIG",
            TermError::JsonError(_) => "JSON_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_label_and_column() {
        let err = TermError::UnknownColumn {
            label: "rw(gr = region)".to_string(),
            column: "region".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown column 'region' referenced by term 'rw(gr = region)'"
        );
        assert_eq!(err.code(), "UNKNOWN_COLUMN");
    }

    #[test]
    fn test_json_error_converts() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: TermError = parse.unwrap_err().into();
        assert_eq!(err.code(), "JSON_ERROR");
    }
}
