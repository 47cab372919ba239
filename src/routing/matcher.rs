//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix on segment boundaries (case-sensitive)
//! - Normalize paths before comparing (`//`, `.` and `..` segments)
//!
//! # Design Decisions
//! - `""` and `"/"` are wildcards
//! - `/app` matches `/app` and `/app/x`, never `/apple`
//! - No regex to guarantee O(n) matching

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
    wildcard: bool,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    /// The prefix is cleaned once here rather than on every request.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let wildcard = prefix.is_empty() || prefix == "/";
        Self {
            prefix: clean_path(&prefix),
            wildcard,
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        if self.wildcard {
            return true;
        }

        let path = clean_path(path);
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.ends_with('/'),
            None => false,
        }
    }
}

/// Lexically clean a URL path.
///
/// Collapses repeated slashes, drops `.` segments and resolves `..` without
/// climbing above the root. A trailing slash on the input is preserved.
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let trailing = path.len() > 1 && path.ends_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }

    let mut cleaned = String::with_capacity(path.len());
    if rooted {
        cleaned.push('/');
    }
    cleaned.push_str(&segments.join("/"));
    if trailing && !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    if cleaned.is_empty() {
        cleaned.push('.');
    }
    cleaned
}
