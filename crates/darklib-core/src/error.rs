use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DarkLibError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Unsupported BITPIX: {0}")]
    UnsupportedBitpix(i64),

    #[error("Input root not found: {0}")]
    InputRootMissing(PathBuf),

    #[error("Library root not writable: {0}")]
    LibraryRootUnwritable(PathBuf),

    #[error("Stacking engine not found: {0}")]
    EngineNotFound(String),

    #[error("Staging failed: {0}")]
    StagingFailed(String),

    #[error("Stacking engine exited with status {0}")]
    StackerExitedNonZero(i32),

    #[error("Stacking engine succeeded but produced no output at {0}")]
    OutputMissing(PathBuf),

    #[error("Failed to update master header: {0}")]
    HeaderWriteFailed(String),
}

pub type Result<T> = std::result::Result<T, DarkLibError>;
