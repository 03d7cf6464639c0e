use crate::ObjectId;

/// Errors produced when parsing object identifiers.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex character at position {position}: '{character}'")]
    InvalidHex { position: usize, character: char },

    #[error("invalid hex length: expected {expected}, got {actual}")]
    InvalidHexLength { expected: usize, actual: usize },

    #[error("invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidHashLength { expected: usize, actual: usize },
}

/// Errors produced by an [`ObjectStore`](crate::ObjectStore).
///
/// Name-resolution outcomes (missing, ambiguous, wrong type) are ordinary
/// results of user input; everything else signals infrastructure trouble.
/// Use [`StoreError::is_fatal`] to tell them apart.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("ambiguous object name: {prefix} matches {count} objects")]
    Ambiguous { prefix: String, count: usize },

    #[error("invalid revision: {0}")]
    InvalidRevision(String),

    #[error("object is not a commit: {0}")]
    NotACommit(ObjectId),

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error("invalid bitmap index: {0}")]
    InvalidBitmap(String),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether this error reflects a broken store rather than a name or
    /// object that simply does not resolve.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Corrupt { .. } | StoreError::InvalidBitmap(_) | StoreError::Io(_)
        )
    }
}
