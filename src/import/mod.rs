//! Importing schedules from external files

mod csv_import;

pub use csv_import::{CsvImportResult, CsvImporter, TimeUnit};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while importing
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for import operations
pub type ImportResult<T> = Result<T, ImportError>;
