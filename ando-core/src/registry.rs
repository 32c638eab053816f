use std::sync::Arc;

use crate::config::ProjectConfig;

/// Immutable, in-memory mapping of configured projects, indexed for
/// longest-prefix lookup on the request path (C1).
///
/// Resolution is O(#projects) over a `Vec` — the spec explicitly allows this
/// over a trie, and project counts are small enough (tens, not thousands)
/// that a linear scan never shows up in a profile.
pub struct ProjectRegistry {
    projects: Vec<Arc<ProjectConfig>>,
}

impl ProjectRegistry {
    pub fn new(projects: Vec<ProjectConfig>) -> Self {
        Self {
            projects: projects.into_iter().map(Arc::new).collect(),
        }
    }

    /// Longest-prefix match: `path == prefix` or `path` starts with
    /// `prefix + "/"`. `None` when no project matches.
    pub fn resolve(&self, path: &str) -> Option<Arc<ProjectConfig>> {
        self.projects
            .iter()
            .filter(|p| path_matches_prefix(path, &p.prefix))
            .max_by_key(|p| p.prefix.len())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

fn path_matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

/// Strip `prefix` from `path`, returning `"/"` when nothing remains (spec
/// §4.5: the proxy forwarder's downstream path computation).
pub fn strip_prefix(path: &str, prefix: &str) -> String {
    let rest = path.strip_prefix(prefix).unwrap_or(path);
    if rest.is_empty() { "/".to_string() } else { rest.to_string() }
}
