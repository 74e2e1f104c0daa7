//! Error types for RAR IO

use std::path::{Path, PathBuf};

/// URS workbook reading errors
#[derive(Debug, thiserror::Error)]
pub enum UrsError {
    /// Workbook does not exist
    #[error("URS file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Extension is not a spreadsheet format
    #[error("unsupported URS format: '{0}' (expected xlsx, xlsm, xls or ods)")]
    UnsupportedFormat(String),

    /// Workbook could not be opened or a sheet could not be read
    #[error("failed to read workbook {}: {message}", .path.display())]
    Workbook { path: PathBuf, message: String },
}

impl UrsError {
    pub(crate) fn workbook(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Workbook {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}
