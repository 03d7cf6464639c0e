//! Reachability using a precomputed bitmap index.

use std::collections::HashSet;

use gitview_object::{Bitmap, BitmapIndex, ObjectId, ObjectStore};

use crate::{check_limit, read_commit_lenient, ReachError, ReachabilityChecker};

/// The set of commits known reachable so far.
///
/// Commits the index covers live in the bitmap; commits newer than the index
/// (no assigned position) are tracked by id.
#[derive(Default)]
struct Reached {
    bits: Bitmap,
    unindexed: HashSet<ObjectId>,
}

impl Reached {
    fn contains(&self, index: &dyn BitmapIndex, oid: &ObjectId) -> bool {
        match index.position(oid) {
            Some(pos) => self.bits.contains(pos),
            None => self.unindexed.contains(oid),
        }
    }

    fn insert(&mut self, index: &dyn BitmapIndex, oid: ObjectId) {
        match index.position(&oid) {
            Some(pos) => self.bits.set(pos),
            None => {
                self.unindexed.insert(oid);
            }
        }
    }
}

/// Builds the reachability set of the start commits from stored bitmaps.
///
/// Starting at each start commit, parents are walked only until a commit with
/// a stored bitmap is met; that bitmap is merged in whole. A stored bitmap
/// covers every ancestor of its commit, so anything already in the set never
/// needs to be walked again.
pub struct BitmappedChecker<'a> {
    store: &'a dyn ObjectStore,
    index: &'a dyn BitmapIndex,
    limit: Option<usize>,
}

impl<'a> BitmappedChecker<'a> {
    pub fn new(store: &'a dyn ObjectStore, index: &'a dyn BitmapIndex, limit: Option<usize>) -> Self {
        Self {
            store,
            index,
            limit,
        }
    }

    /// Add everything reachable from `root` to `reached`.
    fn mark_reachable(
        &self,
        root: ObjectId,
        reached: &mut Reached,
        walked: &mut usize,
    ) -> Result<(), ReachError> {
        let mut stack = vec![root];
        while let Some(oid) = stack.pop() {
            if reached.contains(self.index, &oid) {
                continue;
            }
            if let Some(bitmap) = self.index.bitmap(&oid)? {
                reached.bits.or_assign(&bitmap);
                continue;
            }

            *walked += 1;
            check_limit(self.limit, *walked)?;
            if let Some(commit) = read_commit_lenient(self.store, &oid)? {
                reached.insert(self.index, oid);
                stack.extend(
                    commit
                        .parents
                        .into_iter()
                        .filter(|p| !reached.contains(self.index, p)),
                );
            }
        }
        Ok(())
    }
}

impl ReachabilityChecker for BitmappedChecker<'_> {
    fn are_all_reachable(
        &self,
        targets: &[ObjectId],
        starts: &[ObjectId],
    ) -> Result<Option<ObjectId>, ReachError> {
        if targets.is_empty() {
            return Ok(None);
        }

        let mut reached = Reached::default();
        let mut walked = 0usize;
        for root in starts {
            if reached.contains(self.index, root) {
                continue;
            }
            if read_commit_lenient(self.store, root)?.is_none() {
                continue;
            }
            self.mark_reachable(*root, &mut reached, &mut walked)?;
            if targets.iter().all(|t| reached.contains(self.index, t)) {
                return Ok(None);
            }
        }

        tracing::trace!(walked, "bitmap reachability exhausted start points");
        Ok(targets
            .iter()
            .find(|t| !reached.contains(self.index, t))
            .copied())
    }
}
