//! Error type shared by every Draion component.
//!
//! Store failures are surfaced as [`DraionError::StoreUnavailable`] by the
//! adapters, but the sync session absorbs them: a failed write is logged and
//! retried on the next debounce cycle, never propagated to the editor.

use thiserror::Error;

/// Result alias used throughout `draion_core`.
pub type Result<T> = std::result::Result<T, DraionError>;

/// Errors produced by Draion operations.
#[derive(Debug, Error)]
pub enum DraionError {
    /// The user-supplied page name sanitized down to nothing.
    #[error("Invalid page identifier: {0:?} has no usable characters")]
    InvalidIdentifier(String),

    /// The page name failed the length rules of the page access flow.
    #[error("Invalid page name: {0}")]
    InvalidPageName(String),

    /// The document store could not be reached or rejected the operation.
    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration could not be located or was invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse failure while loading configuration.
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML encoding failure while saving configuration.
    #[error("Config encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

impl DraionError {
    /// Creates a StoreUnavailable error.
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Creates an InvalidPageName error.
    pub fn invalid_page_name(msg: impl Into<String>) -> Self {
        Self::InvalidPageName(msg.into())
    }

    /// Whether this error came from the store layer (and should be absorbed
    /// by the sync session rather than surfaced).
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Io(_))
    }
}
