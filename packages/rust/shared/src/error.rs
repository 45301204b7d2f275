//! Error types for lessonbuild.
//!
//! Library crates use [`LessonError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only configuration and filesystem problems surface as errors. Malformed
//! math, render failures and box layer mismatches are logged and the build
//! carries on.

use std::path::PathBuf;

/// Top-level error type for all lessonbuild operations.
#[derive(Debug, thiserror::Error)]
pub enum LessonError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The output template is missing or unusable.
    #[error("template error: {message}")]
    Template { message: String },

    /// A math expression could not be rendered.
    #[error("render error: {0}")]
    Render(String),

    /// Invalid input (bad folder, empty title, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LessonError>;

impl LessonError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a template error from any displayable message.
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
