//! Revision paths: the `<revision>/<path>` part of a repository browsing URL.
//!
//! [`RevisionParser`] turns strings like `main/src/lib.rs`, `v1.0..main` or
//! `4f2a9c1^!/docs` into [`Revision`]s plus the remaining file path, applying
//! an optional [`BranchRedirect`] and refusing anything the viewer may not
//! see.
//!
//! ```no_run
//! use gitview_object::MemoryStore;
//! use gitview_revision::RevisionParser;
//! use gitview_visibility::{Access, ViewerKey, VisibilityCache};
//!
//! let mut store = MemoryStore::new();
//! let root = store.commit(&[], "initial");
//! store.set_ref("refs/heads/main", root);
//!
//! let cache = VisibilityCache::default();
//! let access = Access::new(ViewerKey::anonymous(), "demo");
//! let parsed = RevisionParser::new(&store, &access, &cache)
//!     .parse("main/README.md")?
//!     .expect("main is visible");
//! assert_eq!(parsed.revision.id, root);
//! assert_eq!(parsed.path, "README.md");
//! # Ok::<(), gitview_revision::RevisionError>(())
//! ```

mod parser;
mod redirect;
mod revision;

pub use parser::{ParseResult, RevisionParser};
pub use redirect::{redirect_revision, BranchRedirect, NoRedirect, StaticRedirects};
pub use revision::Revision;

use gitview_object::StoreError;
use gitview_visibility::VisibilityError;

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Visibility(#[from] VisibilityError),
}
