use std::path::PathBuf;

use armorview_core::ArmorCoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArmorViewError>;

// Clone because in-flight generations are shared between concurrent callers,
// and every one of them receives the same outcome.
#[derive(Error, Debug, Clone)]
pub enum ArmorViewError {
    #[error("Armor source not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("Armor source {path} is malformed: {message}")]
    SourceMalformed { path: PathBuf, message: String },

    #[error("Unknown view {0:?}, expected one of front, top, side")]
    InvalidView(String),

    #[error("Worker pool failure: {0}")]
    Worker(String),

    #[error("I/O failure on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error(transparent)]
    Core(#[from] ArmorCoreError),
}
