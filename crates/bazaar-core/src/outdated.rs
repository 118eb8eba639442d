//! Outdated detection against the catalog.

use bazaar_schema::{Descriptor, is_newer};

/// Whether `installed` has a newer release in `catalog`.
///
/// Only packages hosted under `host_prefix` (`https://github.com/`) with a
/// plain `owner/repo` URL are checked. The first catalog entry with the same
/// `(url, name, author)` and a higher version has its `repo_hash` copied onto
/// `installed` so the update can be downloaded.
pub fn is_outdated<D: Descriptor>(installed: &mut D, catalog: &[D], host_prefix: &str) -> bool {
    let pkg = installed.package();
    let Some(rest) = pkg.url.strip_prefix(host_prefix) else {
        return false;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let &[owner, repo] = segments.as_slice() else {
        return false;
    };
    if owner.trim().is_empty() || repo.trim().is_empty() {
        return false;
    }

    let identity = pkg.identity();
    let Some(newer) = catalog
        .iter()
        .map(|d| d.package())
        .find(|c| c.identity() == identity && is_newer(&pkg.version, &c.version))
    else {
        return false;
    };

    let hash = newer.repo_hash.clone();
    installed.package_mut().repo_hash = hash;
    true
}

/// Mark every outdated package in `installed`; returns how many were marked.
pub fn mark_outdated<D: Descriptor>(installed: &mut [D], catalog: &[D], host_prefix: &str) -> usize {
    let mut marked = 0;
    for d in installed.iter_mut() {
        let outdated = is_outdated(d, catalog, host_prefix);
        d.package_mut().outdated = outdated;
        marked += usize::from(outdated);
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_schema::{Package, Plugin, Theme};

    const HOST: &str = "https://github.com/";

    fn theme(version: &str, hash: &str) -> Theme {
        Theme {
            package: Package {
                url: "https://github.com/a/b".to_string(),
                name: "b".to_string(),
                author: "a".to_string(),
                version: version.to_string(),
                repo_hash: hash.to_string(),
                ..Package::default()
            },
            modes: vec![],
        }
    }

    #[test]
    fn test_newer_catalog_version_is_outdated() {
        let mut installed = theme("1.0.0", "");
        let catalog = vec![theme("1.1.0", "cafe")];
        assert!(is_outdated(&mut installed, &catalog, HOST));
        assert_eq!(installed.package.repo_hash, "cafe");
    }

    #[test]
    fn test_same_or_older_is_current() {
        for v in ["1.0.0", "0.9.0"] {
            let mut installed = theme("1.0.0", "");
            assert!(!is_outdated(&mut installed, &[theme(v, "cafe")], HOST));
            assert_eq!(installed.package.repo_hash, "");
        }
    }

    #[test]
    fn test_identity_must_match() {
        let mut installed = theme("1.0.0", "");
        let mut other = theme("2.0.0", "cafe");
        other.package.author = "someone-else".to_string();
        assert!(!is_outdated(&mut installed, &[other], HOST));
    }

    #[test]
    fn test_foreign_hosts_and_odd_urls_are_skipped() {
        for url in [
            "https://gitlab.com/a/b",
            "https://github.com/a",
            "https://github.com/a/b/c",
            "https://github.com/a/ ",
        ] {
            let mut installed = theme("1.0.0", "");
            installed.package.url = url.to_string();
            let mut newer = theme("9.0.0", "cafe");
            newer.package.url = url.to_string();
            assert!(!is_outdated(&mut installed, &[newer], HOST), "{url}");
        }
    }

    #[test]
    fn test_mark_outdated_plugins() {
        let plugin = |name: &str, version: &str| Plugin {
            package: Package {
                url: format!("https://github.com/a/{name}"),
                name: name.to_string(),
                author: "a".to_string(),
                version: version.to_string(),
                ..Package::default()
            },
        };
        let mut installed = vec![plugin("x", "1.0.0"), plugin("y", "2.0.0")];
        let catalog = vec![plugin("x", "1.0.1"), plugin("y", "2.0.0")];

        assert_eq!(mark_outdated(&mut installed, &catalog, HOST), 1);
        assert!(installed[0].package.outdated);
        assert!(!installed[1].package.outdated);
    }
}
