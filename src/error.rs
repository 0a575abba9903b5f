//! Error types for report loading, reconciliation and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, CombineError>;

#[derive(Debug, Error)]
pub enum CombineError {
    /// A source report does not exist. Callers skip that source.
    #[error("Input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// A non-empty report lacks a column its layout requires.
    #[error("Column '{column}' not found in {table} report")]
    MissingColumn { table: String, column: String },

    /// A join would produce two columns of the same name.
    #[error("Duplicate column '{0}' in joined table")]
    DuplicateColumn(String),

    /// No source table reached the merger.
    #[error("No tool output available: no source produced any data")]
    NoSourceData,

    #[error("Configuration error: {0}")]
    Config(String),

    /// External tool lookup, invocation or version query failed.
    #[error("Tool error: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
