//! Object identity and the object-store interface for gitview.
//!
//! Revision resolution and visibility checks never touch storage directly;
//! they go through the [`ObjectStore`] trait defined here. The crate also ships
//! [`MemoryStore`], a complete in-memory implementation, and the bitmap types
//! used by accelerated reachability checks.

pub mod bitmap;
mod error;
pub mod memory;
mod oid;
mod store;

pub use bitmap::{Bitmap, BitmapIndex, MemoryBitmapIndex};
pub use error::{HashError, StoreError};
pub use memory::MemoryStore;
pub use oid::{is_hex, ObjectId, DIGEST_LEN, HEX_LEN};
pub use store::{ObjectStore, MAX_PEEL_DEPTH, REF_SEARCH_PATH};

/// Namespace holding branches.
pub const R_HEADS: &str = "refs/heads/";
/// Namespace holding tags.
pub const R_TAGS: &str = "refs/tags/";
/// Namespace holding remote-tracking branches.
pub const R_REMOTES: &str = "refs/remotes/";

/// The four git object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    /// The canonical name used in object headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit metadata needed for graph traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub parents: Vec<ObjectId>,
    /// Committer timestamp (seconds since epoch).
    pub commit_time: i64,
}

impl Commit {
    /// The first parent, if any.
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    /// Is this a root commit?
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// A reference as enumerated by a store.
///
/// Symbolic references are reported already resolved. `peeled` is set when
/// `target` names an annotated tag and holds the non-tag object it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub target: ObjectId,
    pub peeled: Option<ObjectId>,
}

impl Reference {
    /// A reference pointing directly at a non-tag object.
    pub fn direct(name: impl Into<String>, target: ObjectId) -> Self {
        Self {
            name: name.into(),
            target,
            peeled: None,
        }
    }

    /// Is this under `refs/heads/`?
    pub fn is_branch(&self) -> bool {
        self.name.starts_with(R_HEADS)
    }

    /// Is this under `refs/tags/`?
    pub fn is_tag(&self) -> bool {
        self.name.starts_with(R_TAGS)
    }

    /// The object a walk should start from: the peeled id when present.
    pub fn peeled_or_target(&self) -> ObjectId {
        self.peeled.unwrap_or(self.target)
    }

    /// Does this reference point at `oid`, directly or after peeling?
    pub fn points_at(&self, oid: &ObjectId) -> bool {
        self.target == *oid || self.peeled.as_ref() == Some(oid)
    }
}
