// src/core/package.rs

//! Packs a chart directory into `<name>-<version>.tar.gz`.

use crate::constants::{METADATA_FILENAME, PACKAGE_EXTENSION};
use crate::models::ChartMetadata;
use flate2::{Compression, write::GzEncoder};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Failed to read chart metadata '{}': {source}", .path.display())]
    MetadataRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse chart metadata '{}': {source}", .path.display())]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Failed to walk '{}': {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to write archive '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes `<dest>/<name>-<version>.tar.gz` holding every file of `chart_dir`, with
/// paths relative to the chart root. Returns the archive path.
pub fn package(chart_dir: &Path, dest: &Path) -> Result<PathBuf, PackageError> {
    let metadata_path = chart_dir.join(METADATA_FILENAME);
    let content = fs::read_to_string(&metadata_path).map_err(|source| PackageError::MetadataRead {
        path: metadata_path.clone(),
        source,
    })?;
    let metadata: ChartMetadata =
        serde_yaml::from_str(&content).map_err(|source| PackageError::MetadataParse {
            path: metadata_path.clone(),
            source,
        })?;

    let archive_path = dest.join(format!(
        "{}-{}.{}",
        metadata.name, metadata.version, PACKAGE_EXTENSION
    ));
    let write_err = |source| PackageError::Write {
        path: archive_path.clone(),
        source,
    };

    fs::create_dir_all(dest).map_err(write_err)?;
    let file = File::create(&archive_path).map_err(write_err)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    // The archive may be written inside the chart itself; never pack it into itself.
    let archive_canonical = dunce::canonicalize(&archive_path).ok();

    for entry in WalkDir::new(chart_dir).sort_by_file_name() {
        let entry = entry.map_err(|source| PackageError::Walk {
            path: chart_dir.to_path_buf(),
            source,
        })?;
        let Ok(relative) = entry.path().strip_prefix(chart_dir) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        if entry.file_type().is_dir() {
            builder
                .append_dir(relative, entry.path())
                .map_err(write_err)?;
        } else {
            if archive_canonical.is_some()
                && dunce::canonicalize(entry.path()).ok() == archive_canonical
            {
                continue;
            }
            builder
                .append_path_with_name(entry.path(), relative)
                .map_err(write_err)?;
        }
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(write_err)?;
    log::info!("Packaged '{}' into '{}'", chart_dir.display(), archive_path.display());
    Ok(archive_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use tempfile::tempdir;

    fn chart(root: &Path) -> PathBuf {
        let dir = root.join("chart");
        fs::create_dir_all(dir.join("templates")).unwrap();
        fs::write(dir.join("metadata.yaml"), "name: web\nversion: 1.2.3\n").unwrap();
        fs::write(dir.join("values.yaml"), "foo: real\n").unwrap();
        fs::write(dir.join("templates/test.sh"), "echo {{ .Values.foo }}").unwrap();
        dir
    }

    fn entries(archive: &Path) -> Vec<String> {
        let file = File::open(archive).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let mut names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn archive_is_named_after_metadata() {
        let work = tempdir().unwrap();
        let archive = package(&chart(work.path()), &work.path().join("dist")).unwrap();
        assert_eq!(archive, work.path().join("dist/web-1.2.3.tar.gz"));
        assert!(archive.is_file());
    }

    #[test]
    fn paths_are_relative_to_the_chart_root() {
        let work = tempdir().unwrap();
        let archive = package(&chart(work.path()), work.path()).unwrap();
        let names = entries(&archive);
        assert!(names.contains(&"metadata.yaml".to_string()));
        assert!(names.contains(&"values.yaml".to_string()));
        assert!(names.contains(&"templates/test.sh".to_string()));
        assert!(names.iter().all(|n| !n.starts_with("chart")));
    }

    #[test]
    fn packaging_into_the_chart_skips_the_archive() {
        let work = tempdir().unwrap();
        let dir = chart(work.path());
        let archive = package(&dir, &dir).unwrap();
        assert!(!entries(&archive).contains(&"web-1.2.3.tar.gz".to_string()));
    }

    #[test]
    fn missing_metadata_fails() {
        let work = tempdir().unwrap();
        let dir = chart(work.path());
        fs::remove_file(dir.join("metadata.yaml")).unwrap();
        let err = package(&dir, work.path()).unwrap_err();
        assert!(matches!(err, PackageError::MetadataRead { .. }));
    }
}
