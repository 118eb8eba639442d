//! Installing and removing package directories.
//!
//! The installation directory is only ever touched by the final swap: the
//! package is unpacked and copied in the temp area and next to the
//! destination first, then renamed into place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;
use tracing::{debug, error};

use crate::error::{BazaarError, Result};
use crate::io::extract::{extract_zip, package_root};

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Recursively copy the contents of `src` into `dst`, creating `dst`.
fn copy_dir_all(src: &Path, dst: &Path) -> std::result::Result<(), fs_extra::error::Error> {
    fs::create_dir_all(dst)?;
    fs_extra::dir::copy(
        src,
        dst,
        &fs_extra::dir::CopyOptions::new()
            .content_only(true)
            .overwrite(true),
    )?;
    Ok(())
}

/// Replace `install_path` with the contents of `src`.
fn swap_into_place(src: &Path, install_path: &Path) -> Result<()> {
    let name = base_name(install_path);
    let parent = install_path
        .parent()
        .ok_or_else(|| BazaarError::filesystem(format!("install package [{name}] failed")))?;
    fs::create_dir_all(parent).map_err(|e| {
        error!(path = %parent.display(), error = %e, "create package root failed");
        BazaarError::filesystem(format!("install package [{name}] failed"))
    })?;

    let staging = tempfile::Builder::new()
        .prefix(&format!(".{name}.staging-"))
        .tempdir_in(parent)
        .map_err(|e| {
            error!(path = %parent.display(), error = %e, "create staging directory failed");
            BazaarError::filesystem(format!("install package [{name}] failed"))
        })?;
    let staged = staging.path().join("content");
    copy_dir_all(src, &staged).map_err(|e| {
        error!(from = %src.display(), to = %staged.display(), error = %e, "copy package failed");
        BazaarError::filesystem(format!("copy package [{name}] failed"))
    })?;

    let previous = staging.path().join("previous");
    let had_previous = install_path.exists();
    if had_previous {
        fs::rename(install_path, &previous).map_err(|e| {
            error!(path = %install_path.display(), error = %e, "move old package aside failed");
            BazaarError::filesystem(format!("install package [{name}] failed"))
        })?;
    }

    if let Err(e) = fs::rename(&staged, install_path) {
        error!(path = %install_path.display(), error = %e, "move package into place failed");
        if had_previous {
            return Err(roll_back(staging, &previous, install_path, &name));
        }
        return Err(BazaarError::filesystem(format!(
            "install package [{name}] failed"
        )));
    }

    // Dropping `staging` removes the previous installation with it.
    Ok(())
}

/// Move the previous installation back after a failed swap. If that fails
/// too, `staging` is kept on disk so the previous copy survives.
fn roll_back(staging: TempDir, previous: &Path, install_path: &Path, name: &str) -> BazaarError {
    if let Err(e) = fs::rename(previous, install_path) {
        let kept = staging.keep();
        error!(
            path = %install_path.display(),
            kept = %kept.display(),
            error = %e,
            "restore previous package failed, previous copy left in staging"
        );
    }
    BazaarError::filesystem(format!("install package [{name}] failed"))
}

fn install_blocking(data: &[u8], install_path: &Path, tmp_dir: &Path) -> Result<()> {
    let name = base_name(install_path);
    fs::create_dir_all(tmp_dir).map_err(|e| {
        error!(path = %tmp_dir.display(), error = %e, "create temp directory failed");
        BazaarError::filesystem(format!("write package [{name}] failed"))
    })?;

    let mut archive = tempfile::Builder::new()
        .suffix(".zip")
        .tempfile_in(tmp_dir)
        .map_err(|e| {
            error!(path = %tmp_dir.display(), error = %e, "create temp archive failed");
            BazaarError::filesystem(format!("write package [{name}] failed"))
        })?;
    archive.write_all(data).and_then(|()| archive.flush()).map_err(|e| {
        error!(path = %archive.path().display(), error = %e, "write temp archive failed");
        BazaarError::filesystem(format!("write package [{name}] failed"))
    })?;

    let unpacked = tempfile::Builder::new()
        .prefix("unpack-")
        .tempdir_in(tmp_dir)
        .map_err(|e| {
            error!(path = %tmp_dir.display(), error = %e, "create unpack directory failed");
            BazaarError::filesystem(format!("unzip package [{name}] failed"))
        })?;
    extract_zip(archive.path(), unpacked.path()).map_err(|e| {
        error!(archive = %archive.path().display(), error = %e, "unzip package failed");
        BazaarError::filesystem(format!("unzip package [{name}] failed"))
    })?;

    let root = package_root(unpacked.path()).map_err(|e| {
        error!(path = %unpacked.path().display(), error = %e, "read unpacked package failed");
        BazaarError::filesystem(format!("unzip package [{name}] failed"))
    })?;

    swap_into_place(&root, install_path)?;
    debug!(path = %install_path.display(), "installed package");
    Ok(())
}

/// Unpack the package archive `data` into `install_path`, replacing whatever
/// is there.
///
/// Scratch files go to `tmp_dir` and are removed whatever the outcome.
///
/// # Errors
///
/// [`BazaarError::Filesystem`] naming only the package directory.
pub async fn install_package(data: Bytes, install_path: PathBuf, tmp_dir: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || install_blocking(&data, &install_path, &tmp_dir))
        .await
        .map_err(|e| BazaarError::filesystem(format!("install task failed: {e}")))?
}

/// Remove an installed package directory. A missing directory is not an
/// error.
///
/// # Errors
///
/// `remove community package [<name>] failed`, where `<name>` is the
/// directory's base name.
pub async fn uninstall_package(install_path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || {
        match fs::remove_dir_all(&install_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                error!(path = %install_path.display(), error = %e, "remove package failed");
                Err(BazaarError::filesystem(format!(
                    "remove community package [{}] failed",
                    base_name(&install_path)
                )))
            }
        }
    })
    .await
    .map_err(|e| BazaarError::filesystem(format!("uninstall task failed: {e}")))?
}

/// Total size in bytes of the files under `path`; unreadable entries count
/// as zero.
pub fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter_map(|e| e.metadata().ok())
        .filter(std::fs::Metadata::is_file)
        .map(|m| m.len())
        .sum()
}
