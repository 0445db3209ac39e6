// ⚠️ Error Types
// One enum for every failure the pipeline can raise. Missing join keys and
// undefined ratios are NOT errors: they travel as `None`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MbrciError {
    // ========================================================================
    // Input tables (fatal at load time)
    // ========================================================================
    #[error("Malformed input table {table}: {reason}")]
    MalformedInputTable { table: String, reason: String },

    #[error("Table {table} is missing column {column}")]
    MissingColumn { table: String, column: String },

    #[error("Table {table} has duplicate key {key}")]
    DuplicateKey { table: String, key: String },

    #[error("Invalid value {value:?} in table {table}, unit {unit}, column {column}")]
    InvalidValue {
        table: String,
        unit: String,
        column: String,
        value: String,
    },

    // ========================================================================
    // Classification
    // ========================================================================
    #[error("Unit {unit} is unclassifiable, missing: {}", missing.join(", "))]
    UnclassifiableUnit { unit: String, missing: Vec<String> },

    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Wrapped library errors
    // ========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MbrciError {
    pub fn malformed(table: &str, reason: impl Into<String>) -> Self {
        MbrciError::MalformedInputTable {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors raised while reading input tables.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            MbrciError::MalformedInputTable { .. }
                | MbrciError::MissingColumn { .. }
                | MbrciError::DuplicateKey { .. }
                | MbrciError::InvalidValue { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MbrciError>;
