use crate::bitmap::BitmapIndex;
use crate::{Commit, ObjectId, ObjectType, Reference, StoreError};

/// Prefixes tried, in order, when a short name is looked up as a reference.
pub const REF_SEARCH_PATH: &[&str] = &["", "refs/", "refs/tags/", "refs/heads/", "refs/remotes/"];

/// Longest tag chain followed before the store is considered corrupt.
pub const MAX_PEEL_DEPTH: usize = 512;

/// Read access to a repository's objects and references.
///
/// Handles are request-scoped: callers borrow a store for the duration of a
/// single parse or visibility check and never retain it.
pub trait ObjectStore: Send + Sync {
    /// Resolve a revision expression (ref name, hex id, `~N`/`^N` suffixes)
    /// to an object id.
    ///
    /// Names that do not resolve yield [`StoreError::UnknownRevision`];
    /// abbreviated ids matching several objects yield
    /// [`StoreError::Ambiguous`]. Both are non-fatal.
    fn resolve(&self, name: &str) -> Result<ObjectId, StoreError>;

    /// Read just the type of an object, `None` if it does not exist.
    fn object_type(&self, oid: &ObjectId) -> Result<Option<ObjectType>, StoreError>;

    /// Read a commit's parents and timestamp.
    ///
    /// Fails with [`StoreError::NotFound`] or [`StoreError::NotACommit`].
    fn read_commit(&self, oid: &ObjectId) -> Result<Commit, StoreError>;

    /// Follow one level of an annotated tag. Non-tag objects peel to themselves.
    fn peel_tag(&self, oid: &ObjectId) -> Result<ObjectId, StoreError>;

    /// Follow a chain of annotated tags to the first non-tag object.
    fn peel_fully(&self, oid: &ObjectId) -> Result<ObjectId, StoreError> {
        let mut current = *oid;
        for _ in 0..MAX_PEEL_DEPTH {
            let next = self.peel_tag(&current)?;
            if next == current {
                return Ok(current);
            }
            current = next;
        }
        Err(StoreError::Corrupt {
            oid: *oid,
            reason: "tag chain exceeds depth limit".into(),
        })
    }

    /// All references, sorted by name, with annotated tags peeled.
    fn references(&self) -> Result<Vec<Reference>, StoreError>;

    /// References whose name starts with `prefix`.
    fn references_with_prefix(&self, prefix: &str) -> Result<Vec<Reference>, StoreError> {
        Ok(self
            .references()?
            .into_iter()
            .filter(|r| r.name.starts_with(prefix))
            .collect())
    }

    /// Look up a possibly-abbreviated reference name using [`REF_SEARCH_PATH`].
    fn find_ref(&self, name: &str) -> Result<Option<Reference>, StoreError> {
        if name.is_empty() {
            return Ok(None);
        }
        let refs = self.references()?;
        for prefix in REF_SEARCH_PATH {
            let full = format!("{prefix}{name}");
            if let Some(r) = refs.iter().find(|r| r.name == full) {
                return Ok(Some(r.clone()));
            }
        }
        Ok(None)
    }

    /// The precomputed reachability bitmap index, if this store has one.
    fn bitmap_index(&self) -> Option<&dyn BitmapIndex> {
        None
    }
}
