//! Visibility answers against in-memory repositories.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use gitview_object::{
    Commit, MemoryStore, ObjectId, ObjectStore, ObjectType, Reference, StoreError,
};
use gitview_visibility::{Access, ViewerKey, VisibilityCache, VisibilityConfig};

/// ```text
/// root - mid - tip      refs/heads/main
///    \
///     - tagged          refs/tags/v1 (annotated)
///    \
///     - review - draft  refs/changes/01/1/1 -> draft
///    \
///     - meta - config   refs/meta/config -> config
///    \
///     - orphan          (unreferenced)
/// ```
struct Repo {
    store: MemoryStore,
    root: ObjectId,
    mid: ObjectId,
    tip: ObjectId,
    tagged: ObjectId,
    review: ObjectId,
    draft: ObjectId,
    meta: ObjectId,
    orphan: ObjectId,
}

fn repo() -> Repo {
    let mut store = MemoryStore::new();
    let root = store.commit(&[], "root");
    let mid = store.commit(&[root], "mid");
    let tip = store.commit(&[mid], "tip");
    store.set_ref("refs/heads/main", tip);

    let tagged = store.commit(&[root], "tagged");
    let before_release = store.commit(&[tagged], "release");
    let tag = store.tag("v1", before_release).unwrap();
    store.set_ref("refs/tags/v1", tag);

    let review = store.commit(&[root], "review");
    let draft = store.commit(&[review], "draft");
    store.set_ref("refs/changes/01/1/1", draft);

    let meta = store.commit(&[root], "meta");
    let config = store.commit(&[meta], "config");
    store.set_ref("refs/meta/config", config);

    let orphan = store.commit(&[root], "orphan");

    Repo {
        store,
        root,
        mid,
        tip,
        tagged,
        review,
        draft,
        meta,
        orphan,
    }
}

fn alice() -> Access {
    Access::new(ViewerKey::new("alice"), "platform/kernel")
}

#[test]
fn reference_tips_are_visible_without_caching() {
    let repo = repo();
    let cache = VisibilityCache::default();

    assert!(cache.is_visible(&alice(), &repo.store, &repo.tip, &[]).unwrap());
    assert!(cache.is_visible(&alice(), &repo.store, &repo.draft, &[]).unwrap());
    assert!(cache.is_empty());
    assert_eq!(cache.stats().loads, 0);
}

#[test]
fn annotated_tag_and_its_target_are_tips() {
    let repo = repo();
    let cache = VisibilityCache::default();
    let tag = repo.store.resolve("refs/tags/v1").unwrap();
    let target = repo.store.peel_tag(&tag).unwrap();

    assert!(cache.is_visible(&alice(), &repo.store, &tag, &[]).unwrap());
    assert!(cache.is_visible(&alice(), &repo.store, &target, &[]).unwrap());
    assert!(cache.is_empty());
}

#[test]
fn ancestors_of_branches_and_tags_are_visible() {
    let repo = repo();
    let cache = VisibilityCache::default();

    assert!(cache.is_visible(&alice(), &repo.store, &repo.mid, &[]).unwrap());
    assert!(cache.is_visible(&alice(), &repo.store, &repo.root, &[]).unwrap());
    assert!(cache.is_visible(&alice(), &repo.store, &repo.tagged, &[]).unwrap());
}

#[test]
fn unpublished_tags_follow_their_target() {
    let mut repo = repo();
    let on_main = repo.store.tag("draft-on-main", repo.mid).unwrap();
    let on_orphan = repo.store.tag("draft-on-orphan", repo.orphan).unwrap();
    let cache = VisibilityCache::default();

    assert!(cache.is_visible(&alice(), &repo.store, &on_main, &[]).unwrap());
    assert!(!cache.is_visible(&alice(), &repo.store, &on_orphan, &[]).unwrap());
}

#[test]
fn excluded_namespaces_grant_nothing_through_ancestry() {
    let repo = repo();
    let cache = VisibilityCache::default();

    assert!(!cache.is_visible(&alice(), &repo.store, &repo.review, &[]).unwrap());
}

#[test]
fn exclusions_are_configurable() {
    let repo = repo();
    let cache = VisibilityCache::new(VisibilityConfig {
        excluded_ref_prefixes: Vec::new(),
        ..VisibilityConfig::default()
    });

    assert!(cache.is_visible(&alice(), &repo.store, &repo.review, &[]).unwrap());
}

#[test]
fn other_references_grant_visibility() {
    let repo = repo();
    let cache = VisibilityCache::default();

    assert!(cache.is_visible(&alice(), &repo.store, &repo.meta, &[]).unwrap());
}

#[test]
fn unreferenced_commits_are_hidden() {
    let repo = repo();
    let cache = VisibilityCache::default();

    assert!(!cache.is_visible(&alice(), &repo.store, &repo.orphan, &[]).unwrap());
    // Negative answers are memoized too.
    assert!(!cache.is_visible(&alice(), &repo.store, &repo.orphan, &[]).unwrap());
    assert_eq!(cache.stats().loads, 1);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn known_reachable_commits_extend_visibility() {
    let repo = repo();
    let cache = VisibilityCache::default();

    // The caller vouches for the draft, whose ancestor is otherwise hidden.
    assert!(cache
        .is_visible(&alice(), &repo.store, &repo.review, &[repo.draft])
        .unwrap());
    assert!(cache
        .is_visible_from(&alice(), &repo.store, &repo.draft, &repo.review)
        .unwrap());
}

#[test]
fn known_commits_are_not_remembered() {
    let repo = repo();
    let cache = VisibilityCache::default();

    assert!(cache
        .is_visible_from(&alice(), &repo.store, &repo.draft, &repo.review)
        .unwrap());
    // Without the anchor only references count.
    assert!(!cache.is_visible(&alice(), &repo.store, &repo.review, &[]).unwrap());
}

#[test]
fn remembered_denial_still_honours_known_commits() {
    let repo = repo();
    let cache = VisibilityCache::default();

    assert!(!cache.is_visible(&alice(), &repo.store, &repo.review, &[]).unwrap());
    assert!(cache
        .is_visible_from(&alice(), &repo.store, &repo.draft, &repo.review)
        .unwrap());
    assert!(!cache
        .is_visible_from(&alice(), &repo.store, &repo.orphan, &repo.review)
        .unwrap());
    assert_eq!(cache.stats().loads, 1);
}

#[test]
fn non_commits_are_never_visible_by_ancestry() {
    let mut repo = repo();
    let blob = repo.store.blob(b"secret");
    let tree = repo.store.tree(&[("secret.txt", blob)]);
    let cache = VisibilityCache::default();

    assert!(!cache.is_visible(&alice(), &repo.store, &blob, &[]).unwrap());
    assert!(!cache.is_visible(&alice(), &repo.store, &tree, &[repo.tip]).unwrap());
    let missing = ObjectId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
    assert!(!cache.is_visible(&alice(), &repo.store, &missing, &[]).unwrap());
}

#[test]
fn answers_are_keyed_by_viewer_and_repository() {
    let repo = repo();
    let mut restricted = repo.store.clone();
    restricted.remove_ref("refs/heads/main");
    let cache = VisibilityCache::default();

    let bob = Access::new(ViewerKey::new("bob"), "platform/kernel");
    let anonymous_elsewhere = Access::new(ViewerKey::anonymous(), "platform/other");

    assert!(cache.is_visible(&alice(), &repo.store, &repo.mid, &[]).unwrap());
    assert!(!cache.is_visible(&bob, &restricted, &repo.mid, &[]).unwrap());
    assert!(!cache
        .is_visible(&anonymous_elsewhere, &restricted, &repo.mid, &[])
        .unwrap());
    assert_eq!(cache.stats().loads, 3);
    assert_eq!(cache.len(), 3);
}

#[test]
fn repeated_queries_are_served_from_cache() {
    let repo = repo();
    let cache = VisibilityCache::default();

    for _ in 0..5 {
        assert!(cache.is_visible(&alice(), &repo.store, &repo.root, &[]).unwrap());
    }
    let stats = cache.stats();
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);
}

#[test]
fn invalidation_forces_recomputation() {
    let repo = repo();
    let cache = VisibilityCache::default();

    assert!(cache.is_visible(&alice(), &repo.store, &repo.root, &[]).unwrap());
    cache.invalidate_all();
    assert!(cache.is_visible(&alice(), &repo.store, &repo.root, &[]).unwrap());
    assert_eq!(cache.stats().loads, 2);
}

#[test]
fn bitmapped_store_gives_the_same_answers() {
    let repo = repo();
    let mut indexed = repo.store.clone();
    indexed.build_bitmap_index();
    let plain = VisibilityCache::default();
    let bitmapped = VisibilityCache::default();

    for id in [
        repo.root, repo.mid, repo.tip, repo.tagged, repo.review, repo.draft, repo.meta,
        repo.orphan,
    ] {
        assert_eq!(
            plain.is_visible(&alice(), &repo.store, &id, &[]).unwrap(),
            bitmapped.is_visible(&alice(), &indexed, &id, &[]).unwrap(),
            "{id}"
        );
    }
}

#[test]
fn exhausted_traversal_denies_without_caching() {
    let mut store = MemoryStore::new();
    let root = store.commit(&[], "root");
    let mut tip = root;
    for i in 0..32 {
        tip = store.commit(&[tip], &format!("c{i}"));
    }
    store.set_ref("refs/heads/main", tip);

    let limited = VisibilityCache::new(VisibilityConfig {
        traversal_limit: Some(4),
        ..VisibilityConfig::default()
    });
    assert!(!limited.is_visible(&alice(), &store, &root, &[]).unwrap());
    assert!(limited.is_empty());

    let unlimited = VisibilityCache::new(VisibilityConfig {
        traversal_limit: None,
        ..VisibilityConfig::default()
    });
    assert!(unlimited.is_visible(&alice(), &store, &root, &[]).unwrap());
}

/// Delegates to a [`MemoryStore`], failing commit reads with an I/O error.
struct BrokenDisk(MemoryStore);

impl ObjectStore for BrokenDisk {
    fn resolve(&self, name: &str) -> Result<ObjectId, StoreError> {
        self.0.resolve(name)
    }

    fn object_type(&self, oid: &ObjectId) -> Result<Option<ObjectType>, StoreError> {
        self.0.object_type(oid)
    }

    fn read_commit(&self, _oid: &ObjectId) -> Result<Commit, StoreError> {
        Err(io::Error::other("pack file truncated").into())
    }

    fn peel_tag(&self, oid: &ObjectId) -> Result<ObjectId, StoreError> {
        self.0.peel_tag(oid)
    }

    fn references(&self) -> Result<Vec<Reference>, StoreError> {
        self.0.references()
    }
}

#[test]
fn store_failures_propagate() {
    let repo = repo();
    let broken = BrokenDisk(repo.store.clone());
    let cache = VisibilityCache::default();

    let err = cache
        .is_visible(&alice(), &broken, &repo.root, &[])
        .unwrap_err();
    assert!(matches!(err.store_error(), StoreError::Io(_)));
    assert!(cache.is_empty());

    // Tips need no commit reads.
    assert!(cache.is_visible(&alice(), &broken, &repo.tip, &[]).unwrap());
}

/// Delegates to a [`MemoryStore`], counting slow commit reads.
struct SlowStore {
    inner: MemoryStore,
    reads: AtomicUsize,
}

impl ObjectStore for SlowStore {
    fn resolve(&self, name: &str) -> Result<ObjectId, StoreError> {
        self.inner.resolve(name)
    }

    fn object_type(&self, oid: &ObjectId) -> Result<Option<ObjectType>, StoreError> {
        self.inner.object_type(oid)
    }

    fn read_commit(&self, oid: &ObjectId) -> Result<Commit, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        self.inner.read_commit(oid)
    }

    fn peel_tag(&self, oid: &ObjectId) -> Result<ObjectId, StoreError> {
        self.inner.peel_tag(oid)
    }

    fn references(&self) -> Result<Vec<Reference>, StoreError> {
        self.inner.references()
    }
}

#[test]
fn concurrent_requests_share_one_computation() {
    let repo = repo();
    let store = SlowStore {
        inner: repo.store.clone(),
        reads: AtomicUsize::new(0),
    };
    let cache = VisibilityCache::default();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let answers: Vec<bool> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.is_visible(&alice(), &store, &repo.root, &[]).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(answers.iter().all(|&visible| visible));
    assert_eq!(cache.stats().loads, 1);
    assert_eq!(cache.len(), 1);
}
