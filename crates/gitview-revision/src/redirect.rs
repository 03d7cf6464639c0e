//! Branch renames applied while parsing.
//!
//! A [`BranchRedirect`] maps a branch name a viewer typed (say `master`) to
//! the name it should be served under (say `main`).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::Revision;

pub trait BranchRedirect: Send + Sync {
    /// The branch `source_ref` should be served as in `repository`, if any.
    fn redirect_branch(&self, repository: &str, source_ref: &str) -> Option<String>;
}

/// Never redirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRedirect;

impl BranchRedirect for NoRedirect {
    fn redirect_branch(&self, _repository: &str, _source_ref: &str) -> Option<String> {
        None
    }
}

impl<F> BranchRedirect for F
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync,
{
    fn redirect_branch(&self, repository: &str, source_ref: &str) -> Option<String> {
        self(repository, source_ref)
    }
}

/// A fixed rename table, per repository.
///
/// Deserializes from a map of repository name to `{ from: to }` maps:
///
/// ```json
/// { "platform/kernel": { "master": "main" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct StaticRedirects {
    repositories: BTreeMap<String, BTreeMap<String, String>>,
}

impl StaticRedirects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        repository: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) {
        self.repositories
            .entry(repository.into())
            .or_default()
            .insert(from.into(), to.into());
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.values().all(BTreeMap::is_empty)
    }
}

impl BranchRedirect for StaticRedirects {
    fn redirect_branch(&self, repository: &str, source_ref: &str) -> Option<String> {
        self.repositories.get(repository)?.get(source_ref).cloned()
    }
}

/// Rename an already resolved revision, keeping its ids.
///
/// `None` when the policy has nothing to say, and always for
/// [`Revision::NULL`].
pub fn redirect_revision(
    policy: &dyn BranchRedirect,
    repository: &str,
    revision: &Revision,
) -> Option<Revision> {
    if revision.is_null() {
        return None;
    }
    let target = policy.redirect_branch(repository, &revision.name)?;
    tracing::trace!(repository, from = %revision.name, to = %target, "redirecting revision");
    Some(revision.named(target))
}
