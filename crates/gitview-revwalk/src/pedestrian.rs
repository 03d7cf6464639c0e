//! Reachability by walking parent links.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use gitview_object::{ObjectId, ObjectStore};

use crate::{check_limit, read_commit_lenient, ReachError, ReachabilityChecker};

/// Entry in the walk queue.
struct WalkEntry {
    oid: ObjectId,
    date: i64,
    parents: Vec<ObjectId>,
}

impl PartialEq for WalkEntry {
    fn eq(&self, other: &Self) -> bool {
        self.oid == other.oid
    }
}

impl Eq for WalkEntry {}

impl PartialOrd for WalkEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WalkEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap by date (newest first), ties broken by id for determinism.
        self.date
            .cmp(&other.date)
            .then_with(|| self.oid.cmp(&other.oid))
    }
}

/// Walks from the start commits towards the roots until every target has
/// been seen or the history is exhausted.
///
/// Commits are visited newest-first, so targets close to the start points are
/// found without touching old history.
pub struct PedestrianChecker<'a> {
    store: &'a dyn ObjectStore,
    limit: Option<usize>,
}

impl<'a> PedestrianChecker<'a> {
    pub fn new(store: &'a dyn ObjectStore, limit: Option<usize>) -> Self {
        Self { store, limit }
    }

    fn enqueue(
        &self,
        queue: &mut BinaryHeap<WalkEntry>,
        oid: ObjectId,
    ) -> Result<(), ReachError> {
        if let Some(commit) = read_commit_lenient(self.store, &oid)? {
            queue.push(WalkEntry {
                oid,
                date: commit.commit_time,
                parents: commit.parents,
            });
        }
        Ok(())
    }
}

impl ReachabilityChecker for PedestrianChecker<'_> {
    fn are_all_reachable(
        &self,
        targets: &[ObjectId],
        starts: &[ObjectId],
    ) -> Result<Option<ObjectId>, ReachError> {
        let mut pending: HashSet<ObjectId> = targets.iter().copied().collect();
        if pending.is_empty() {
            return Ok(None);
        }

        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut queue = BinaryHeap::new();
        for oid in starts {
            if seen.insert(*oid) {
                self.enqueue(&mut queue, *oid)?;
            }
        }

        while let Some(entry) = queue.pop() {
            pending.remove(&entry.oid);
            if pending.is_empty() {
                return Ok(None);
            }

            for parent in entry.parents {
                if !seen.insert(parent) {
                    continue;
                }
                check_limit(self.limit, seen.len())?;
                self.enqueue(&mut queue, parent)?;
            }
        }

        Ok(targets.iter().find(|t| pending.contains(t)).copied())
    }
}
