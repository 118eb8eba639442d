//! Domain-specific errors for marketplace operations

use bazaar_schema::{PackageKind, ReferenceError};
use thiserror::Error;

use crate::io::download::DownloadError;

#[derive(Error, Debug)]
pub enum BazaarError {
    /// Descriptor file absent from the local installation.
    #[error("{kind}.json not found in [{name}]")]
    NotFound { kind: PackageKind, name: String },

    /// Malformed descriptor or remote metadata.
    #[error("Failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// Archive write/unzip/copy/remove failure. Carries a user-facing message
    /// only; the underlying error is logged where it happens.
    #[error("{0}")]
    Filesystem(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl BazaarError {
    pub fn parse(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            what: what.into(),
            source,
        }
    }

    pub fn filesystem(msg: impl std::fmt::Display) -> Self {
        Self::Filesystem(msg.to_string())
    }
}

pub type Result<T, E = BazaarError> = std::result::Result<T, E>;
