pub mod format;
pub mod screening;

pub use format::*;
pub use screening::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    /// `reason` is the full uploader-facing sentence and already names the document.
    #[error("{reason}")]
    Rejected { document: String, reason: String },

    #[error("{document}: declared as {declared} but the file content is {detected}")]
    TypeMismatch {
        document: String,
        declared: String,
        detected: &'static str,
    },

    #[error("{document}: unsupported file type {declared}")]
    UnsupportedType { document: String, declared: String },

    #[error("Please upload all required valid documents before submitting (missing: {missing:?}, rejected: {rejected:?})")]
    Incomplete {
        missing: Vec<String>,
        rejected: Vec<String>,
    },
}
