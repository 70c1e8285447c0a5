//! Fatal errors of a run.
//!
//! Per-row problems are not errors; they travel as [`crate::api::RowOutcome`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid file format: {} ({reason})", path.display())]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("Sheet '{0}' not found in the workbook")]
    MissingSheet(String),

    #[error("Column 'ID' not found in sheet '{0}'")]
    MissingIdColumn(String),

    #[error("Invalid {what} URL '{value}': {reason}")]
    InvalidEndpoint {
        what: &'static str,
        value: String,
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Editing or saving the workbook failed.
    #[error("Workbook error: {0:#}")]
    Workbook(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EnrichError>;
