// src/core/acquire.rs

//! Turns a chart reference (directory, packaged archive or URL) into a local directory.

use crate::constants::METADATA_FILENAME;
use flate2::read::GzDecoder;
use log::{debug, info};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Chart '{reference}' does not exist")]
    NotFound { reference: String },
    #[error("Failed to download chart from '{url}': {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to unpack chart archive '{archive}': {source}")]
    Extract {
        archive: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A chart directory ready to be read. When the chart came from an archive or a URL,
/// the unpacked copy lives as long as this value does.
#[derive(Debug)]
pub struct ChartSource {
    path: PathBuf,
    unpacked_copy: Option<TempDir>,
}

impl ChartSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the directory is a temporary copy rather than the user's files.
    pub fn is_unpacked(&self) -> bool {
        self.unpacked_copy.is_some()
    }
}

/// True for `http://` and `https://` references that carry a host.
pub fn is_remote(reference: &str) -> bool {
    reqwest::Url::parse(reference)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

fn is_archive(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Resolves `reference` into a chart directory. Temporary files go under `scratch_root`.
pub fn acquire(reference: &str, scratch_root: &Path) -> Result<ChartSource, AcquireError> {
    if is_remote(reference) {
        let download = download(reference, scratch_root)?;
        return unpack(download.path(), reference, scratch_root);
    }

    let path = PathBuf::from(shellexpand::tilde(reference).into_owned());
    if path.is_dir() {
        debug!("Using chart directory '{}'", path.display());
        return Ok(ChartSource {
            path,
            unpacked_copy: None,
        });
    }
    if path.is_file() && is_archive(&path) {
        return unpack(&path, reference, scratch_root);
    }
    Err(AcquireError::NotFound {
        reference: reference.to_string(),
    })
}

fn download(url: &str, scratch_root: &Path) -> Result<tempfile::NamedTempFile, AcquireError> {
    info!("Downloading chart from {}", url);
    let download_err = |source| AcquireError::Download {
        url: url.to_string(),
        source,
    };
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;

    let io_err = |source| AcquireError::Io {
        path: scratch_root.display().to_string(),
        source,
    };
    fs::create_dir_all(scratch_root).map_err(io_err)?;
    let mut file = tempfile::Builder::new()
        .prefix("charty-download-")
        .suffix(".tar.gz")
        .tempfile_in(scratch_root)
        .map_err(io_err)?;
    response.copy_to(&mut file).map_err(download_err)?;
    Ok(file)
}

fn unpack(archive: &Path, reference: &str, scratch_root: &Path) -> Result<ChartSource, AcquireError> {
    let extract_err = |source| AcquireError::Extract {
        archive: reference.to_string(),
        source,
    };
    fs::create_dir_all(scratch_root).map_err(|source| AcquireError::Io {
        path: scratch_root.display().to_string(),
        source,
    })?;
    let dir = tempfile::Builder::new()
        .prefix("charty-src-")
        .tempdir_in(scratch_root)
        .map_err(|source| AcquireError::Io {
            path: scratch_root.display().to_string(),
            source,
        })?;

    let file = File::open(archive).map_err(extract_err)?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(dir.path())
        .map_err(extract_err)?;
    debug!("Unpacked '{}' into '{}'", reference, dir.path().display());

    let path = chart_root(dir.path());
    Ok(ChartSource {
        path,
        unpacked_copy: Some(dir),
    })
}

/// Archives either hold the chart files at their root or inside one top-level directory.
fn chart_root(unpacked: &Path) -> PathBuf {
    if unpacked.join(METADATA_FILENAME).is_file() {
        return unpacked.to_path_buf();
    }
    let entries: Vec<PathBuf> = fs::read_dir(unpacked)
        .map(|rd| rd.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    match entries.as_slice() {
        [only] if only.join(METADATA_FILENAME).is_file() => only.clone(),
        _ => unpacked.to_path_buf(),
    }
}
