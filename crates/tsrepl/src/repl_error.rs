use std::{fmt, path::PathBuf};

use crate::{events::ErrorKind, transform::TransformError};

/// Error type for evaluation, separating failures by pipeline stage.
///
/// The coordinator never returns these to callers directly: each is turned into a
/// [`crate::ReplOutput::Error`] carrying its text and [`ErrorKind`].
#[derive(Debug, Clone)]
pub enum ReplError {
    /// No session has the requested id.
    SessionNotFound(String),
    /// The session has no namespace with the requested id.
    NamespaceNotFound(String),
    /// A namespace sandbox could not be set up.
    NamespaceCreation { namespace: String, reason: String },
    /// The source file of a namespace could not be read.
    SourceUnreadable { path: PathBuf, reason: String },
    /// The fragment failed to parse; nothing ran.
    Transform(TransformError),
    /// The fragment threw or its promise rejected. Holds the formatted exception.
    Runtime(String),
}

impl ReplError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Self::NamespaceNotFound(_) | Self::SourceUnreadable { .. } => ErrorKind::NamespaceNotFound,
            Self::NamespaceCreation { .. } => ErrorKind::NamespaceCreation,
            Self::Transform(_) => ErrorKind::Transform,
            Self::Runtime(_) => ErrorKind::Runtime,
        }
    }
}

impl fmt::Display for ReplError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "Session not found: {id}"),
            Self::NamespaceNotFound(id) => write!(f, "Namespace not found: {id}"),
            Self::NamespaceCreation { namespace, reason } => {
                write!(f, "Cannot create namespace {namespace}: {reason}")
            }
            Self::SourceUnreadable { path, reason } => write!(f, "Cannot read {}: {reason}", path.display()),
            Self::Transform(error) => write!(f, "{error}"),
            Self::Runtime(text) => f.write_str(text),
        }
    }
}

impl std::error::Error for ReplError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transform(error) => Some(error),
            _ => None,
        }
    }
}

impl From<TransformError> for ReplError {
    fn from(error: TransformError) -> Self {
        Self::Transform(error)
    }
}
