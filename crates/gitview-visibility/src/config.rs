use std::time::Duration;

use serde::Deserialize;

/// Settings for a [`VisibilityCache`](crate::VisibilityCache).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Maximum number of memoized answers.
    pub max_entries: usize,
    /// Age after which a memoized answer is recomputed.
    pub expire_after_write_secs: u64,
    /// Reference namespaces that never grant visibility through ancestry,
    /// such as code-review change refs.
    pub excluded_ref_prefixes: Vec<String>,
    /// Maximum commits one reachability check may visit. Checks that hit the
    /// limit answer "not visible".
    pub traversal_limit: Option<usize>,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            max_entries: 1 << 10,
            expire_after_write_secs: 30 * 60,
            excluded_ref_prefixes: vec!["refs/changes/".to_string()],
            traversal_limit: Some(10_000_000),
        }
    }
}

impl VisibilityConfig {
    pub fn expire_after_write(&self) -> Duration {
        Duration::from_secs(self.expire_after_write_secs)
    }

    /// Is `ref_name` in one of the excluded namespaces?
    pub fn is_excluded(&self, ref_name: &str) -> bool {
        self.excluded_ref_prefixes
            .iter()
            .any(|prefix| ref_name.starts_with(prefix.as_str()))
    }
}
