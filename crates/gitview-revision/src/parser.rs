//! Splitting a URL path into revisions and a file path.
//!
//! Accepted shapes, each optionally followed by `/<path>`:
//!
//! - `<rev>`: one revision, e.g. `main/src/lib.rs`
//! - `<old>..<rev>`: a range, e.g. `v1.0..main/docs`
//! - `<rev>^!`: a commit against its first parent
//!
//! Revision names may themselves contain slashes (`feature/login`), so the
//! parser grows the candidate name one path segment at a time and stops at the
//! first prefix that resolves.

use std::fmt;

use gitview_object::{ObjectStore, ObjectType};
use gitview_visibility::{Access, VisibilityCache};

use crate::redirect::{BranchRedirect, NoRedirect};
use crate::{Revision, RevisionError};

/// Revisions and residual path extracted from a URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub revision: Revision,
    /// Set for `<old>..<rev>` and `<rev>^!`; [`Revision::NULL`] when `<rev>`
    /// has no parent.
    pub old_revision: Option<Revision>,
    /// Path after the revision, without a leading slash. May be empty.
    pub path: String,
}

impl ParseResult {
    pub fn new(revision: Revision) -> Self {
        Self {
            revision,
            old_revision: None,
            path: String::new(),
        }
    }
}

impl fmt::Display for ParseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "revision={}", self.revision.name)?;
        if let Some(old) = &self.old_revision {
            write!(f, ", old_revision={}", old.name)?;
        }
        write!(f, ", path={}", self.path)
    }
}

/// Parses revision paths for one viewer of one repository.
///
/// Unknown, ambiguous, malformed and invisible revisions all produce
/// `Ok(None)`, so callers cannot tell a hidden commit from a missing one.
/// Errors are reserved for store failures.
pub struct RevisionParser<'a> {
    store: &'a dyn ObjectStore,
    access: &'a Access,
    cache: &'a VisibilityCache,
    redirect: &'a dyn BranchRedirect,
}

impl<'a> RevisionParser<'a> {
    pub fn new(store: &'a dyn ObjectStore, access: &'a Access, cache: &'a VisibilityCache) -> Self {
        Self {
            store,
            access,
            cache,
            redirect: &NoRedirect,
        }
    }

    pub fn with_redirect(mut self, redirect: &'a dyn BranchRedirect) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn parse(&self, path: &str) -> Result<Option<ParseResult>, RevisionError> {
        let path = path.strip_prefix('/').unwrap_or(path);
        if path.is_empty() {
            return Ok(None);
        }

        // Left side of a range: length of the name as typed, and the revision.
        let mut old: Option<(usize, Revision)> = None;
        let mut name = String::new();

        // An empty segment ends the search, but only if no shorter prefix has
        // resolved: `main//x` is `main` with path `/x`.
        for (i, segment) in path.split('/').enumerate() {
            if segment.is_empty() {
                return Ok(None);
            }
            if i > 0 {
                name.push('/');
            }

            let mut part = segment;
            if old.is_none() {
                let dots = part.find("..");
                let first_parent = part.find("^!");
                if dots == Some(0) || first_parent == Some(0) {
                    return Ok(None);
                }

                if let Some(dots) = dots {
                    name.push_str(&part[..dots]);
                    let old_name = std::mem::take(&mut name);
                    let redirected = self.redirect_name(&old_name);
                    if !is_valid_revision(&redirected) {
                        return Ok(None);
                    }
                    let Some(old_revision) = self.resolve(&redirected)? else {
                        return Ok(None);
                    };
                    old = Some((old_name.len(), old_revision));
                    part = &part[dots + 2..];
                } else if let Some(at) = first_parent {
                    if at != part.len() - 2 {
                        return Ok(None);
                    }
                    name.push_str(&part[..at]);
                    return self.parse_first_parent(path, &name);
                }
            }

            name.push_str(part);
            if !is_valid_revision(&name) {
                return Ok(None);
            }
            let redirected = self.redirect_name(&name);
            let Some(revision) = self.resolve(&redirected)? else {
                continue;
            };

            let path_start = match &old {
                None => name.len(),
                Some((old_len, _)) => old_len + 2 + name.len(),
            };
            let result = ParseResult {
                revision,
                old_revision: old.map(|(_, rev)| rev),
                path: residual(&path[path_start..]),
            };
            return self.check_visible(result);
        }
        Ok(None)
    }

    /// `<name>^!`: the commit `name` peels to, against its first parent.
    fn parse_first_parent(
        &self,
        path: &str,
        name: &str,
    ) -> Result<Option<ParseResult>, RevisionError> {
        if !is_valid_revision(name) {
            return Ok(None);
        }
        let redirected = self.redirect_name(name);
        let Some(target) = self.resolve(&redirected)? else {
            return Ok(None);
        };

        let commit_id = target.commitish();
        let commit = match self.store.read_commit(&commit_id) {
            Ok(commit) => commit,
            Err(e) if !e.is_fatal() => {
                tracing::trace!(name, error = %e, "first-parent diff of a non-commit");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let old = match commit.first_parent() {
            Some(parent) => Revision::peeled(format!("{redirected}^"), *parent, ObjectType::Commit),
            None => Revision::NULL,
        };
        let result = ParseResult {
            revision: Revision::peeled(redirected, commit_id, ObjectType::Commit),
            old_revision: Some(old),
            path: residual(&path[name.len() + 2..]),
        };
        self.check_visible(result)
    }

    /// Resolve and peel a candidate name; `None` when it names nothing
    /// usable, including tags whose target is missing.
    fn resolve(&self, name: &str) -> Result<Option<Revision>, RevisionError> {
        let peeled = self
            .store
            .resolve(name)
            .and_then(|id| Revision::peel(name, id, self.store));
        match peeled {
            Ok(revision) => Ok(Some(revision)),
            Err(e) if !e.is_fatal() => {
                tracing::trace!(name, error = %e, "candidate does not resolve");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply the branch redirect policy to a candidate name.
    ///
    /// The policy sees the name with everything but letters and slashes
    /// removed (`main~2` asks about `main`); its answer replaces that text
    /// wherever it occurs in the candidate.
    fn redirect_name(&self, raw: &str) -> String {
        let guess: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphabetic() || *c == '/')
            .collect();
        if guess.is_empty() {
            return raw.to_string();
        }
        match self.redirect.redirect_branch(self.access.repository(), &guess) {
            Some(target) => {
                tracing::trace!(from = %guess, to = %target, "redirecting branch");
                raw.replace(&guess, &target)
            }
            None => raw.to_string(),
        }
    }

    fn check_visible(&self, result: ParseResult) -> Result<Option<ParseResult>, RevisionError> {
        let revision = &result.revision;
        if !self.names_ref(&revision.name)?
            && !self
                .cache
                .is_visible(self.access, self.store, &revision.id, &[])?
        {
            tracing::debug!(revision = %revision, "revision not visible to viewer");
            return Ok(None);
        }

        if let Some(old) = result.old_revision.as_ref().filter(|old| !old.is_null()) {
            if !self.names_ref(&old.name)?
                && !self.cache.is_visible_from(
                    self.access,
                    self.store,
                    &revision.commitish(),
                    &old.id,
                )?
            {
                tracing::debug!(old_revision = %old, "old revision not visible to viewer");
                return Ok(None);
            }
        }
        Ok(Some(result))
    }

    /// Does `name`, up to its first `^` or `~`, name a reference?
    fn names_ref(&self, name: &str) -> Result<bool, RevisionError> {
        let base = name.split(['^', '~']).next().unwrap_or_default();
        Ok(self.store.find_ref(base)?.is_some())
    }
}

/// Reject revision expressions that are valid to git but not in a URL.
fn is_valid_revision(name: &str) -> bool {
    !name.contains(':') && !name.contains("^{") && !name.contains("@{") && name != "@"
}

fn residual(rest: &str) -> String {
    rest.strip_prefix('/').unwrap_or(rest).to_string()
}
