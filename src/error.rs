//! Error type shared by every stage of project generation and read-back.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VcxprojError>;

#[derive(Debug, Error)]
pub enum VcxprojError {
    /// The requested project format is older than anything this generator
    /// can emit.  Raised before any output is opened.
    #[error("format version {requested} is not supported (minimum is {minimum:.1})")]
    UnsupportedVersion { requested: String, minimum: f64 },

    #[error("cannot parse format version '{0}'")]
    InvalidVersion(String),

    #[error("unable to open '{}' for writing: {source}", path.display())]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// Neither the directory nor the file interpretation of a path could be
    /// made relative to the project directory.
    #[error("cannot resolve '{path}': {reason}")]
    PathResolution { path: String, reason: String },

    #[error("item '{include}' assigned to undeclared filter '{filter}'")]
    UndeclaredFilter { include: String, filter: String },

    #[error("generation stage out of order: expected {expected}, found {found}")]
    OutOfOrder {
        expected: &'static str,
        found: &'static str,
    },

    #[error("XML Error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("{0}")]
    Condition(String),

    #[error("invalid manifest '{}': {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },
}

impl VcxprojError {
    pub(crate) fn path_resolution(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
