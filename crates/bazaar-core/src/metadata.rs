//! Reading descriptors of locally installed packages.

use std::fs;
use std::path::{Path, PathBuf};

use bazaar_schema::Descriptor;
use chrono::{DateTime, Local};
use tracing::{error, warn};

use crate::config::BazaarConfig;
use crate::error::{BazaarError, Result};

/// Path of the descriptor file of the installed package `dir_name`.
pub fn descriptor_path<D: Descriptor>(config: &BazaarConfig, dir_name: &str) -> PathBuf {
    config
        .install_dir(D::KIND, dir_name)
        .join(D::KIND.descriptor_file())
}

/// Load `<kind root>/<dir_name>/<kind>.json`.
///
/// The trailing `/` of the descriptor's `url` is stripped.
///
/// # Errors
///
/// - [`BazaarError::NotFound`] if the descriptor file does not exist.
/// - [`BazaarError::Io`] if it cannot be read.
/// - [`BazaarError::Parse`] if it is not a valid descriptor.
pub fn load_descriptor<D: Descriptor>(config: &BazaarConfig, dir_name: &str) -> Result<D> {
    let path = descriptor_path::<D>(config, dir_name);
    if !path.exists() {
        return Err(BazaarError::NotFound {
            kind: D::KIND,
            name: dir_name.to_string(),
        });
    }
    load_descriptor_file(&path)
}

fn load_descriptor_file<D: Descriptor>(path: &Path) -> Result<D> {
    let data = fs::read(path).map_err(|e| {
        error!(path = %path.display(), error = %e, "read {} failed", D::KIND.descriptor_file());
        e
    })?;

    let mut descriptor: D = serde_json::from_slice(&data).map_err(|e| {
        error!(path = %path.display(), error = %e, "parse {} failed", D::KIND.descriptor_file());
        BazaarError::parse(path.display().to_string(), e)
    })?;

    let pkg = descriptor.package_mut();
    let trimmed_len = pkg.url.trim_end_matches('/').len();
    pkg.url.truncate(trimmed_len);
    Ok(descriptor)
}

/// An installed package as found on disk.
#[derive(Debug, Clone)]
pub struct InstalledEntry<D> {
    /// Directory name under the kind root.
    pub dir_name: String,
    /// Full installation directory.
    pub path: PathBuf,
    pub descriptor: D,
}

/// Every installed package of kind `D`, in directory-name order.
///
/// Directories without a readable descriptor are skipped with a warning. The
/// returned descriptors are marked installed, localized, and carry their
/// install date; the package name falls back to the directory name.
pub fn scan_installed<D: Descriptor>(config: &BazaarConfig) -> Result<Vec<InstalledEntry<D>>> {
    let root = config.kind_root(D::KIND);
    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            error!(path = %root.display(), error = %e, "read package root failed");
            return Err(e.into());
        }
    };

    let mut installed = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        if dir_name.starts_with('.') {
            continue;
        }

        let mut descriptor = match load_descriptor::<D>(config, &dir_name) {
            Ok(d) => d,
            Err(e) => {
                warn!(kind = %D::KIND, dir = %dir_name, error = %e, "skipping installed package");
                continue;
            }
        };

        let path = entry.path();
        let pkg = descriptor.package_mut();
        if pkg.name.is_empty() {
            pkg.name = dir_name.clone();
        }
        pkg.installed = true;
        pkg.localize(config.locale);
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            pkg.h_install_date = DateTime::<Local>::from(modified)
                .format("%Y-%m-%d")
                .to_string();
        }

        installed.push(InstalledEntry {
            dir_name,
            path,
            descriptor,
        });
    }

    installed.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    Ok(installed)
}
