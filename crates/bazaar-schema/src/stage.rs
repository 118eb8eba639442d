//! Wire types for the staged marketplace index and the usage index.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::locale::LocalizedText;
use crate::package::Funding;
use crate::reference::{ReferenceError, RepoRef};

/// Staged catalog snapshot for one package kind.
///
/// Served from `<marketplace-repo>/raw/<hash>/stage/<kind-plural>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageIndex {
    /// Catalog entries, in publication order.
    #[serde(default)]
    pub repos: Vec<StageRepo>,
}

impl StageIndex {
    /// Find the entry for an `owner/repo@hash` URL.
    pub fn find(&self, url: &str) -> Option<&StageRepo> {
        self.repos.iter().find(|r| r.url == url)
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageRepo {
    /// `owner/repo@hash`.
    pub url: String,
    /// Last update timestamp (usually RFC 3339).
    pub updated: String,
    /// Repository stars.
    pub stars: u64,
    /// Open issues.
    pub open_issues: u64,
    /// Package archive size in bytes.
    pub size: u64,
    /// Unpacked size in bytes.
    pub install_size: u64,
    /// Descriptor subset published with the entry.
    pub package: Option<StagePackage>,
}

impl StageRepo {
    /// Parse the entry URL into a repository reference.
    ///
    /// # Errors
    ///
    /// Fails if the URL is not of the form `owner/repo@hash`.
    pub fn repo_ref(&self) -> Result<RepoRef, ReferenceError> {
        RepoRef::parse(&self.url)
    }
}

/// Descriptor subset embedded in a [`StageRepo`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePackage {
    /// Author handle.
    pub author: String,
    /// Source repository URL.
    pub url: String,
    /// Published version.
    pub version: String,
    /// Localized description.
    pub description: Option<LocalizedText>,
    /// Localized README paths.
    pub readme: Option<LocalizedText>,
    /// Locales the package is translated into.
    #[serde(rename = "i18n")]
    pub i18n: Vec<String>,
    /// Sponsorship links.
    pub funding: Option<Funding>,
}

/// Download statistics for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageEntry {
    /// Package name.
    pub name: String,
    /// Total downloads.
    pub downloads: u64,
}

/// Usage index served from `<stats-server>/bazaar/index.json`, keyed by
/// package name.
pub type UsageIndex = HashMap<String, UsageEntry>;

/// Render a catalog timestamp as `YYYY-MM-DD`.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and bare dates. Anything else is
/// cut at the first `T`, or stripped of `Z` markers.
pub fn format_updated(updated: &str) -> String {
    if let Ok(t) = DateTime::parse_from_rfc3339(updated) {
        return t.format("%Y-%m-%d").to_string();
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(updated, "%Y-%m-%d %H:%M:%S") {
        return t.format("%Y-%m-%d").to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(updated, "%Y-%m-%d") {
        return d.format("%Y-%m-%d").to_string();
    }

    match updated.find('T') {
        Some(idx) => updated[..idx].to_string(),
        None => updated.replace('Z', ""),
    }
}

/// Human-readable byte size (`1.5 MB`).
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "kB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stage_index() {
        let json = r#"{
            "repos": [{
                "url": "alice/sample-plugin@0123abcd",
                "updated": "2024-03-05T08:09:10Z",
                "stars": 12,
                "openIssues": 3,
                "size": 2048,
                "installSize": 8192,
                "package": {
                    "author": "alice",
                    "url": "https://github.com/alice/sample-plugin",
                    "version": "0.3.1",
                    "readme": {"default": "README.md", "zh_CN": "README_zh_CN.md"},
                    "i18n": ["zh_CN", "en_US"]
                }
            }]
        }"#;
        let index: StageIndex = serde_json::from_str(json).unwrap();
        let repo = index.find("alice/sample-plugin@0123abcd").unwrap();
        assert_eq!(repo.open_issues, 3);
        assert_eq!(repo.install_size, 8192);
        let pkg = repo.package.as_ref().unwrap();
        assert_eq!(pkg.i18n, vec!["zh_CN".to_string(), "en_US".to_string()]);
        assert_eq!(repo.repo_ref().unwrap().hash, "0123abcd");
        assert!(index.find("alice/other@0123abcd").is_none());
    }

    #[test]
    fn test_parse_usage_index() {
        let index: UsageIndex =
            serde_json::from_str(r#"{"sample":{"name":"sample","downloads":42}}"#).unwrap();
        assert_eq!(index["sample"].downloads, 42);
    }

    #[test]
    fn test_format_updated() {
        assert_eq!(format_updated("2024-03-05T08:09:10Z"), "2024-03-05");
        assert_eq!(format_updated("2024-03-05T23:09:10+08:00"), "2024-03-05");
        assert_eq!(format_updated("2024-03-05 08:09:10"), "2024-03-05");
        assert_eq!(format_updated("2024-03-05"), "2024-03-05");
        assert_eq!(format_updated("garbageTmore"), "garbage");
        assert_eq!(format_updated("oddZ"), "odd");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1500), "1.5 kB");
        assert_eq!(human_size(2_000_000), "2.0 MB");
    }
}
