//! Package archive extraction.
//!
//! Packages are published as zip files. Many of them wrap their content in a
//! single top-level directory (`pkg/plugin.json`); [`package_root`] detects
//! that convention so the wrapper never lands in the installation directory.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid path in archive: {0}")]
    UnsafePath(String),
}

/// Extract a zip archive from disk into `dest_dir`.
///
/// Returns the extracted files, relative to `dest_dir`.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    extract_zip_from(File::open(archive_path)?, dest_dir)
}

/// Extract a zip archive from any seekable reader.
///
/// Any entry whose name would resolve outside `dest_dir` fails the whole
/// extraction.
pub fn extract_zip_from<R: Read + Seek>(
    reader: R,
    dest_dir: &Path,
) -> Result<Vec<PathBuf>, ExtractError> {
    let mut archive = ZipArchive::new(reader).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = entry.enclosed_name() else {
            return Err(ExtractError::UnsafePath(entry.name().to_string()));
        };

        let absolute_path = dest_dir.join(&relative_path);
        if entry.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&absolute_path)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }

        extracted.push(relative_path);
    }

    Ok(extracted)
}

/// The directory holding the package content after extraction into `dir`.
///
/// If `dir` contains exactly one entry and it is a directory, that directory
/// is the root; otherwise `dir` itself is.
pub fn package_root(dir: &Path) -> io::Result<PathBuf> {
    let mut entries = fs::read_dir(dir)?;
    let (Some(first), None) = (entries.next(), entries.next()) else {
        return Ok(dir.to_path_buf());
    };

    let first = first?;
    if first.file_type()?.is_dir() {
        Ok(first.path())
    } else {
        Ok(dir.to_path_buf())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    /// Build an in-memory zip from `(name, content)` pairs. Names ending in
    /// `/` become directories.
    pub(crate) fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let data = zip_bytes(&[("a.txt", "A"), ("sub/b.txt", "B")]);
        let files = extract_zip_from(Cursor::new(data), dir.path()).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(fs::read_to_string(dir.path().join("sub/b.txt")).unwrap(), "B");
    }

    #[test]
    fn test_rejects_escaping_entries() {
        let dir = tempfile::tempdir().unwrap();
        let data = zip_bytes(&[("../evil.txt", "x")]);
        let err = extract_zip_from(Cursor::new(data), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ExtractError::UnsafePath(_)));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_zip_from(Cursor::new(b"not a zip".to_vec()), dir.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Archive(_)));
    }

    #[test]
    fn test_package_root_detection() {
        let dir = tempfile::tempdir().unwrap();

        let wrapped = dir.path().join("wrapped");
        fs::create_dir_all(wrapped.join("pkg")).unwrap();
        assert_eq!(package_root(&wrapped).unwrap(), wrapped.join("pkg"));

        let single_file = dir.path().join("single_file");
        fs::create_dir_all(&single_file).unwrap();
        fs::write(single_file.join("plugin.json"), "{}").unwrap();
        assert_eq!(package_root(&single_file).unwrap(), single_file);

        let flat = dir.path().join("flat");
        fs::create_dir_all(flat.join("pkg")).unwrap();
        fs::write(flat.join("plugin.json"), "{}").unwrap();
        assert_eq!(package_root(&flat).unwrap(), flat);
    }
}
