//! Error types for the ovfedit core library.

use std::path::PathBuf;

/// The main error type for OVF editing operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// The document (or a captured fragment of it) is not well-formed XML.
    #[error("malformed OVF document: {message}")]
    MalformedDocument { message: String },

    /// A located element could not be decoded into its record type.
    #[error("failed to decode <{element}> element: {message}")]
    Decode { element: String, message: String },

    /// The edit scheme references an element kind the decoder does not
    /// know how to handle.
    #[error("unsupported element kind '{local_name}'")]
    UnsupportedElementKind { local_name: String },

    /// A conversion request that cannot be honored (e.g. identical input
    /// and output paths).
    #[error("conversion error: {message}")]
    Convert { message: String },
}

/// A specialized Result type for OVF editing operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Create an I/O error without path context.
    pub fn io_simple(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }

    /// Create a malformed document error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }

    /// Create a decode error for the named element.
    pub fn decode(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported element kind error.
    pub fn unsupported_kind(local_name: impl Into<String>) -> Self {
        Self::UnsupportedElementKind {
            local_name: local_name.into(),
        }
    }

    /// Create a conversion error.
    pub fn convert(message: impl Into<String>) -> Self {
        Self::Convert {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_simple(source)
    }
}
