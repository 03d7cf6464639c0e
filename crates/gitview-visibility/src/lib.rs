//! Per-viewer object visibility.
//!
//! A viewer may see a commit when it is reachable from a reference the viewer
//! can see. [`VisibilityCache`] answers that question for a request-scoped
//! [`ObjectStore`](gitview_object::ObjectStore) and memoizes the answer per
//! (viewer, repository, object), bounded by entry count and entry age.

mod access;
mod cache;
mod config;

pub use access::{Access, ViewerKey, VisibilityKey};
pub use cache::{CacheStats, VisibilityCache};
pub use config::VisibilityConfig;

use std::sync::Arc;

use gitview_object::StoreError;

/// Errors produced by visibility checks.
///
/// Only store failures surface here; denial is an `Ok(false)` answer. The
/// store error is shared because every caller waiting on the same
/// computation receives it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VisibilityError {
    #[error(transparent)]
    Store(Arc<StoreError>),
}

impl VisibilityError {
    /// The underlying store failure.
    pub fn store_error(&self) -> &StoreError {
        match self {
            VisibilityError::Store(e) => e,
        }
    }
}

impl From<StoreError> for VisibilityError {
    fn from(e: StoreError) -> Self {
        VisibilityError::Store(Arc::new(e))
    }
}
