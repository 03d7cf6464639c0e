//! Cache of per-viewer object visibility.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gitview_object::{ObjectId, ObjectStore, Reference, StoreError};
use gitview_revwalk::{ReachError, Reachability};
use moka::sync::Cache;

use crate::access::{Access, VisibilityKey};
use crate::config::VisibilityConfig;
use crate::VisibilityError;

/// Why a memoized computation produced no answer. Never cached.
#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("traversal limit of {limit} commits exceeded")]
    TraversalLimit { limit: usize },

    #[error(transparent)]
    Store(Arc<StoreError>),
}

impl From<ReachError> for LoadError {
    fn from(e: ReachError) -> Self {
        match e {
            ReachError::TraversalLimit { limit } => LoadError::TraversalLimit { limit },
            ReachError::Store(e) => LoadError::Store(Arc::new(e)),
        }
    }
}

impl From<StoreError> for LoadError {
    fn from(e: StoreError) -> Self {
        LoadError::Store(Arc::new(e))
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Answers served from a live entry.
    pub hits: u64,
    /// Lookups that found no live entry.
    pub misses: u64,
    /// Reachability computations actually run.
    pub loads: u64,
}

/// Memoized answers to "may this viewer see this object?".
///
/// Shared by all requests (wrap it in an `Arc`). The object store is borrowed
/// per call and never retained; only ids and names are kept.
///
/// Only answers derived from the repository's references are memoized.
/// Commits a caller vouches for through `known_reachable` are consulted on
/// every call and never influence what is stored.
pub struct VisibilityCache {
    config: VisibilityConfig,
    entries: Cache<VisibilityKey, bool>,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
}

impl Default for VisibilityCache {
    fn default() -> Self {
        Self::new(VisibilityConfig::default())
    }
}

impl VisibilityCache {
    pub fn new(config: VisibilityConfig) -> Self {
        let entries = Cache::builder()
            .max_capacity(config.max_entries.max(1) as u64)
            .time_to_live(config.expire_after_write())
            .build();
        Self {
            config,
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    /// May the viewer in `access` see `id`?
    ///
    /// `known_reachable` lists commits the caller already knows to be
    /// visible; they are tried as start points before any reference.
    pub fn is_visible(
        &self,
        access: &Access,
        store: &dyn ObjectStore,
        id: &ObjectId,
        known_reachable: &[ObjectId],
    ) -> Result<bool, VisibilityError> {
        let refs = store.references()?;

        // Objects a reference points at are visible by definition. Not cached:
        // the answer only holds while the references do.
        if refs.iter().any(|r| r.points_at(id)) {
            tracing::trace!(%id, "object is a reference tip");
            return Ok(true);
        }

        // Annotated tags are judged by the commit they point at.
        let Some(commit) = target_commit(store, id)? else {
            return Ok(false);
        };
        let checker = Reachability::for_store(store, self.config.traversal_limit);

        let key = VisibilityKey::new(access, *id);
        if let Some(visible) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(visible || self.reachable_from_known(&checker, &commit, known_reachable)?);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        if self.reachable_from_known(&checker, &commit, known_reachable)? {
            return Ok(true);
        }

        let loaded = self.entries.try_get_with(key, || {
            self.loads.fetch_add(1, Ordering::Relaxed);
            let visible = self.reachable_from_refs(&checker, &refs, &commit)?;
            tracing::debug!(
                repository = access.repository(),
                %id,
                visible,
                "computed visibility"
            );
            Ok::<_, LoadError>(visible)
        });
        match loaded {
            Ok(visible) => Ok(visible),
            Err(e) => match &*e {
                LoadError::TraversalLimit { limit } => {
                    tracing::warn!(
                        %id,
                        limit,
                        strategy = %checker.strategy(),
                        "reachability traversal limit exceeded; treating object as not visible"
                    );
                    Ok(false)
                }
                LoadError::Store(e) => Err(VisibilityError::Store(Arc::clone(e))),
            },
        }
    }

    /// May the viewer see `to`, given that `from` is already known visible?
    pub fn is_visible_from(
        &self,
        access: &Access,
        store: &dyn ObjectStore,
        from: &ObjectId,
        to: &ObjectId,
    ) -> Result<bool, VisibilityError> {
        self.is_visible(access, store, to, &[*from])
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every memoized answer.
    pub fn invalidate_all(&self) {
        self.entries.invalidate_all();
    }

    /// Is `commit` reachable from commits the caller vouches for?
    fn reachable_from_known(
        &self,
        checker: &Reachability<'_>,
        commit: &ObjectId,
        known_reachable: &[ObjectId],
    ) -> Result<bool, VisibilityError> {
        if known_reachable.is_empty() {
            return Ok(false);
        }
        match checker.is_reachable(commit, known_reachable) {
            Ok(reachable) => Ok(reachable),
            Err(ReachError::TraversalLimit { limit }) => {
                tracing::warn!(%commit, limit, "traversal limit exceeded walking known commits");
                Ok(false)
            }
            Err(ReachError::Store(e)) => Err(e.into()),
        }
    }

    /// Branches, then tags, then any other reference outside the excluded
    /// namespaces.
    fn reachable_from_refs(
        &self,
        checker: &Reachability<'_>,
        refs: &[Reference],
        commit: &ObjectId,
    ) -> Result<bool, LoadError> {
        // Branches before tags: most requests are for commits near a branch
        // tip, and tags tend to sit far back in history.
        let candidates = [
            ("branches", start_points(refs, |r| r.is_branch())),
            ("tags", start_points(refs, |r| r.is_tag())),
            (
                "other refs",
                start_points(refs, |r| {
                    !r.is_branch() && !r.is_tag() && !self.config.is_excluded(&r.name)
                }),
            ),
        ];
        for (source, starts) in candidates {
            if !starts.is_empty() && checker.is_reachable(commit, &starts)? {
                tracing::trace!(%commit, source, "reachable");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// The commit `id` names, peeling annotated tags; `None` for anything else.
fn target_commit(
    store: &dyn ObjectStore,
    id: &ObjectId,
) -> Result<Option<ObjectId>, VisibilityError> {
    match store
        .peel_fully(id)
        .and_then(|oid| store.read_commit(&oid).map(|_| oid))
    {
        Ok(oid) => Ok(Some(oid)),
        Err(e) if !e.is_fatal() => {
            tracing::debug!(%id, error = %e, "not a commit; not visible by ancestry");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn start_points(refs: &[Reference], keep: impl Fn(&Reference) -> bool) -> Vec<ObjectId> {
    refs.iter()
        .filter(|r| keep(r))
        .map(Reference::peeled_or_target)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitview_object::MemoryStore;

    use crate::ViewerKey;

    fn access(viewer: &str) -> Access {
        Access::new(ViewerKey::new(viewer), "repo")
    }

    fn chain(len: usize) -> (MemoryStore, Vec<ObjectId>) {
        let mut store = MemoryStore::new();
        let mut commits = vec![store.commit(&[], "root")];
        for i in 0..len {
            let parent = commits[commits.len() - 1];
            commits.push(store.commit(&[parent], &format!("c{i}")));
        }
        let tip = store.commit(&[commits[commits.len() - 1]], "tip");
        store.set_ref("refs/heads/main", tip);
        (store, commits)
    }

    #[test]
    fn capacity_bounds_entries() {
        let (store, commits) = chain(4);
        let cache = VisibilityCache::new(VisibilityConfig {
            max_entries: 2,
            ..VisibilityConfig::default()
        });
        for c in &commits {
            assert!(cache.is_visible(&access("a"), &store, c, &[]).unwrap());
        }
        assert!(cache.len() <= 2);
        assert_eq!(cache.stats().loads, commits.len() as u64);
    }

    #[test]
    fn zero_capacity_still_caches() {
        let (store, commits) = chain(1);
        let cache = VisibilityCache::new(VisibilityConfig {
            max_entries: 0,
            ..VisibilityConfig::default()
        });
        assert!(cache.is_visible(&access("a"), &store, &commits[0], &[]).unwrap());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entries_are_recomputed() {
        let (store, commits) = chain(1);
        let cache = VisibilityCache::new(VisibilityConfig {
            expire_after_write_secs: 0,
            ..VisibilityConfig::default()
        });
        assert!(cache.is_visible(&access("a"), &store, &commits[0], &[]).unwrap());
        assert!(cache.is_visible(&access("a"), &store, &commits[0], &[]).unwrap());
        assert_eq!(cache.stats().loads, 2);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn invalidate_all_empties_cache() {
        let (store, commits) = chain(1);
        let cache = VisibilityCache::default();
        assert!(cache.is_visible(&access("a"), &store, &commits[0], &[]).unwrap());
        assert!(!cache.is_empty());
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
