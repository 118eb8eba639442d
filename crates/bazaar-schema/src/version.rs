//! Version comparison for outdated and compatibility checks.
//!
//! Package versions are stored without a prefix (`1.2.3`) but compared as
//! `v`-prefixed semantic versions: bare shorthand (`v1`, `v1.2`) is accepted,
//! build metadata is ignored, and anything unparsable orders below every
//! valid version.

use std::cmp::Ordering;

use semver::{BuildMetadata, Version};

/// Minimum app version assumed for packages that do not declare one, when
/// strict compatibility checking is enabled.
pub const DEFAULT_MIN_APP_VERSION: &str = "2.9.0";

/// Parse a raw stored version the way the comparator sees it.
fn canonical(raw: &str) -> Option<Version> {
    let prefixed = format!("v{}", raw.trim());
    let body = prefixed.strip_prefix('v')?;
    if body.is_empty() {
        return None;
    }

    // Shorthand is only padded when nothing follows it: `1.2-rc.1` and
    // `1+build` stay invalid.
    let padded = match (body.contains(['-', '+']), body.split('.').count()) {
        (false, 1) => format!("{body}.0.0"),
        (false, 2) => format!("{body}.0"),
        _ => body.to_string(),
    };

    let mut version = Version::parse(&padded).ok()?;
    version.build = BuildMetadata::EMPTY;
    Some(version)
}

/// Compare two raw version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (canonical(a), canonical(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Returns true if `latest` is strictly newer than `current`.
pub fn is_newer(current: &str, latest: &str) -> bool {
    compare_versions(current, latest) == Ordering::Less
}

/// Whether a package requiring `min_app_version` cannot run on `app_version`.
///
/// An empty minimum passes unless `strict` is set, in which case
/// [`DEFAULT_MIN_APP_VERSION`] stands in for it.
pub fn is_incompatible(min_app_version: &str, app_version: &str, strict: bool) -> bool {
    let min = match min_app_version.trim() {
        "" if strict => DEFAULT_MIN_APP_VERSION,
        "" => return false,
        v => v,
    };
    compare_versions(min, app_version) == Ordering::Greater
}
