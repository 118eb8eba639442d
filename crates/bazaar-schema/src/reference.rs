//! Repository references: `owner/repo@commitHash[/relative/path]`.
//!
//! This is the addressing unit for every remote fetch: package archives are
//! addressed by `owner/repo@hash`, individual repository files (READMEs,
//! descriptors) by appending a relative path.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::GITHUB_HOST;

/// Errors raised while parsing a [`RepoRef`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// Fewer than three `/`- or `@`-separated tokens.
    #[error("parse repository information failed: {0}")]
    TooFewParts(String),
}

/// A parsed repository reference.
///
/// # Example
///
/// ```
/// use bazaar_schema::RepoRef;
///
/// let r: RepoRef = "owner/repo@abc123/docs/readme.md".parse().unwrap();
/// assert_eq!(r.owner, "owner");
/// assert_eq!(r.repo, "repo");
/// assert_eq!(r.hash, "abc123");
/// assert_eq!(r.path.as_deref(), Some("docs/readme.md"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Commit hash the reference is pinned to.
    pub hash: String,
    /// Optional repository-relative file path.
    pub path: Option<String>,
}

impl RepoRef {
    /// Build a package-archive reference (no path).
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            hash: hash.into(),
            path: None,
        }
    }

    /// Same repository and hash, addressing `path` inside it.
    pub fn with_path(&self, path: impl AsRef<str>) -> Self {
        let path = path.as_ref().trim_matches('/');
        Self {
            path: (!path.is_empty()).then(|| path.to_string()),
            ..self.clone()
        }
    }

    /// Parse a reference, tolerating a leading `https://github.com/`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::TooFewParts`] when the input does not
    /// contain at least an owner, a repository and a hash.
    pub fn parse(s: &str) -> Result<Self, ReferenceError> {
        let trimmed = strip_host(s);
        let mut tokens = trimmed
            .split(['/', '@'])
            .filter(|t| !t.is_empty());

        let (Some(owner), Some(repo), Some(hash)) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(ReferenceError::TooFewParts(s.to_string()));
        };

        let rest: Vec<&str> = tokens.collect();
        let path = (!rest.is_empty()).then(|| rest.join("/"));

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            hash: hash.to_string(),
            path,
        })
    }

    /// `owner/repo`.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// `owner/repo@hash`, without any path.
    pub fn package_key(&self) -> String {
        format!("{}/{}@{}", self.owner, self.repo, self.hash)
    }

    /// Whether the reference targets a documentation file.
    pub fn is_documentation(&self) -> bool {
        self.path.as_deref().is_some_and(|p| p.contains(".md"))
    }
}

impl FromStr for RepoRef {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.hash)?;
        if let Some(path) = &self.path {
            write!(f, "/{path}")?;
        }
        Ok(())
    }
}

/// Strip the canonical host prefix from a repository URL, if present.
pub fn strip_host(url: &str) -> &str {
    url.strip_prefix(GITHUB_HOST)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_path() {
        let r = RepoRef::parse("owner/repo@abc123/docs/readme.md").unwrap();
        assert_eq!(r.owner, "owner");
        assert_eq!(r.repo, "repo");
        assert_eq!(r.hash, "abc123");
        assert_eq!(r.path.as_deref(), Some("docs/readme.md"));
        assert!(r.is_documentation());
        assert_eq!(r.to_string(), "owner/repo@abc123/docs/readme.md");
    }

    #[test]
    fn test_parse_without_path() {
        let r: RepoRef = "88250/Comfortably-Numb@6286912c".parse().unwrap();
        assert_eq!(r.path, None);
        assert_eq!(r.package_key(), "88250/Comfortably-Numb@6286912c");
        assert_eq!(r.slug(), "88250/Comfortably-Numb");
        assert!(!r.is_documentation());
    }

    #[test]
    fn test_parse_strips_canonical_host() {
        let r = RepoRef::parse("https://github.com/owner/repo@abc").unwrap();
        assert_eq!(r, RepoRef::new("owner", "repo", "abc"));
    }

    #[test]
    fn test_parse_too_few_parts() {
        assert_eq!(
            RepoRef::parse("owner/repo"),
            Err(ReferenceError::TooFewParts("owner/repo".to_string()))
        );
        assert!(RepoRef::parse("").is_err());
        assert!(RepoRef::parse("//@@").is_err());
    }

    #[test]
    fn test_with_path() {
        let r = RepoRef::new("o", "r", "h");
        assert_eq!(r.with_path("/plugin.json").to_string(), "o/r@h/plugin.json");
        assert_eq!(r.with_path("").path, None);
    }
}
