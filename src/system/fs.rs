// src/system/fs.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("Could not walk '{}': {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Could not copy '{}' to '{}': {source}", .from.display(), .to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Mirrors the tree rooted at `src` into `dst`, creating `dst` if needed.
/// Files are copied byte-for-byte; existing files in `dst` are overwritten.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), CopyError> {
    log::debug!("Copying tree {} -> {}", src.display(), dst.display());
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|source| CopyError::Walk {
            path: src.to_path_buf(),
            source,
        })?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        let io_err = |source| CopyError::Io {
            from: entry.path().to_path_buf(),
            to: target.clone(),
            source,
        };

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(io_err)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
            fs::copy(entry.path(), &target).map_err(io_err)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copies_nested_files_verbatim() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("top.txt"), b"top").unwrap();
        fs::write(src.path().join("a/b/deep.bin"), [0u8, 159, 146, 150]).unwrap();
        fs::create_dir_all(src.path().join("empty")).unwrap();

        let target = dst.path().join("out");
        copy_tree(src.path(), &target).unwrap();

        assert_eq!(fs::read(target.join("top.txt")).unwrap(), b"top");
        assert_eq!(fs::read(target.join("a/b/deep.bin")).unwrap(), vec![0u8, 159, 146, 150]);
        assert!(target.join("empty").is_dir());
    }

    #[test]
    fn missing_source_is_an_error() {
        let dst = TempDir::new().unwrap();
        let result = copy_tree(&dst.path().join("nope"), &dst.path().join("out"));
        assert!(matches!(result, Err(CopyError::Walk { .. })));
    }
}
