//! Commit reachability for gitview.
//!
//! A commit is reachable from a set of start commits if it equals one of them
//! or is an ancestor of one. Two interchangeable checkers answer that
//! question:
//!
//! - [`BitmappedChecker`] unions precomputed reachability bitmaps and only walks
//!   the commits that sit above the nearest stored bitmap;
//! - [`PedestrianChecker`] walks parent links newest-first with a visited set.
//!
//! [`Reachability::for_store`] asks the store once for a bitmap index and picks the strategy.
//! Both walks are iterative and can be bounded by a traversal limit, so deep
//! histories never exhaust the stack.

mod bitmapped;
mod pedestrian;

pub use bitmapped::BitmappedChecker;
pub use pedestrian::PedestrianChecker;

use gitview_object::{Commit, ObjectId, ObjectStore, StoreError};

/// Errors produced by reachability checks.
#[derive(Debug, thiserror::Error)]
pub enum ReachError {
    #[error("traversal limit of {limit} commits exceeded")]
    TraversalLimit { limit: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Answers ancestry questions over a commit graph.
pub trait ReachabilityChecker {
    /// Check whether every commit in `targets` is reachable from `starts`.
    ///
    /// Returns the first target that is not reachable, or `None` if all are.
    /// Start points that are missing or are not commits are skipped.
    fn are_all_reachable(
        &self,
        targets: &[ObjectId],
        starts: &[ObjectId],
    ) -> Result<Option<ObjectId>, ReachError>;
}

/// Which algorithm a [`Reachability`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Bitmapped,
    Pedestrian,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Strategy::Bitmapped => "bitmapped",
            Strategy::Pedestrian => "pedestrian",
        })
    }
}

/// A reachability checker chosen for a particular store.
pub enum Reachability<'a> {
    Bitmapped(BitmappedChecker<'a>),
    Pedestrian(PedestrianChecker<'a>),
}

impl<'a> Reachability<'a> {
    /// Use the store's bitmap index when it has one, otherwise walk the graph.
    ///
    /// `limit` caps the number of commits a single check may visit.
    pub fn for_store(store: &'a dyn ObjectStore, limit: Option<usize>) -> Self {
        match store.bitmap_index() {
            Some(index) => Self::Bitmapped(BitmappedChecker::new(store, index, limit)),
            None => Self::Pedestrian(PedestrianChecker::new(store, limit)),
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Bitmapped(_) => Strategy::Bitmapped,
            Self::Pedestrian(_) => Strategy::Pedestrian,
        }
    }

    /// Is `target` reachable from any of `starts`?
    pub fn is_reachable(&self, target: &ObjectId, starts: &[ObjectId]) -> Result<bool, ReachError> {
        Ok(self.are_all_reachable(&[*target], starts)?.is_none())
    }
}

impl ReachabilityChecker for Reachability<'_> {
    fn are_all_reachable(
        &self,
        targets: &[ObjectId],
        starts: &[ObjectId],
    ) -> Result<Option<ObjectId>, ReachError> {
        match self {
            Self::Bitmapped(c) => c.are_all_reachable(targets, starts),
            Self::Pedestrian(c) => c.are_all_reachable(targets, starts),
        }
    }
}

/// Read a commit, treating missing objects and non-commits as absent.
pub(crate) fn read_commit_lenient(
    store: &dyn ObjectStore,
    oid: &ObjectId,
) -> Result<Option<Commit>, ReachError> {
    match store.read_commit(oid) {
        Ok(commit) => Ok(Some(commit)),
        Err(e) if !e.is_fatal() => {
            tracing::trace!(%oid, error = %e, "skipping non-commit");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn check_limit(limit: Option<usize>, visited: usize) -> Result<(), ReachError> {
    match limit {
        Some(limit) if visited > limit => Err(ReachError::TraversalLimit { limit }),
        _ => Ok(()),
    }
}
