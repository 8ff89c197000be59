//! Error types for document handling and measure resolution.
//!
//! Every recoverable condition is returned as one of these values; the
//! session never turns them into panics.

use thiserror::Error;

use crate::model::ElementIdentity;

/// Fatal errors while loading a structured document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Failed to read file '{path}': {reason}")]
    Read { path: String, reason: String },

    /// Source bytes are not UTF-8
    #[error("Invalid UTF-8 in document source: {0}")]
    InvalidUtf8(String),

    /// XML is malformed (not well-formed)
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    /// Two elements carry the same identity
    #[error("Duplicate element identity '{0}'")]
    DuplicateIdentity(ElementIdentity),
}

/// Errors from tree queries and mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("No element with identity '{0}'")]
    NotFound(ElementIdentity),

    /// A replacement sub-tree reuses an identity living elsewhere in the document
    #[error("Identity '{0}' is already used outside the replaced sub-tree")]
    DuplicateIdentity(ElementIdentity),

    /// The generated-identity counter is at its maximum
    #[error("No fresh identity left after '{0}'")]
    IdentitiesExhausted(ElementIdentity),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A rendered projection does not match the sub-tree it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Projection addresses '{0}', which the measure does not contain")]
    UnknownIdentity(ElementIdentity),
}

/// Failures of the external rendering capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("Rendering failed: {0}")]
    Failed(String),

    #[error("Rendered output could not be read: {0}")]
    InvalidOutput(#[from] ParseError),
}

/// Transport and protocol failures talking to the merge service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeServiceError {
    #[error("Merge service unreachable: {0}")]
    Transport(String),

    #[error("Merge service timed out")]
    Timeout,

    #[error("Merge service returned HTTP {0}")]
    Status(u16),

    /// The reply does not follow the request/response contract
    #[error("Malformed merge service reply: {0}")]
    Protocol(String),
}

/// Problems reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcomes of resolution-session operations that are not a success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No element with identity '{0}'")]
    NotFound(ElementIdentity),

    #[error("Element '{id}' is a <{kind}>, not a measure")]
    NotAMeasure { id: ElementIdentity, kind: String },

    /// Stems and other rendering artifacts cannot be eliminated on their own
    #[error("Element '{0}' cannot be eliminated")]
    NotEliminable(ElementIdentity),

    #[error("No measure is open for resolution")]
    NoOpenMeasure,

    /// A merge request is outstanding; retry once it completes
    #[error("Session is busy submitting measure '{0}'")]
    SessionBusy(ElementIdentity),

    #[error(transparent)]
    MergeService(#[from] MergeServiceError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Document(DocumentError),

    /// Internal state no longer matches the document; the session was reset
    #[error("Resolution session invariant violated: {0}")]
    Invariant(String),
}

impl From<DocumentError> for ResolveError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound(id) => ResolveError::NotFound(id),
            other => ResolveError::Document(other),
        }
    }
}

impl From<ParseError> for ResolveError {
    fn from(err: ParseError) -> Self {
        ResolveError::Document(DocumentError::Parse(err))
    }
}
