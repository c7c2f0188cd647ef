//! # Chart Materializer
//!
//! A [`Chart`] owns everything needed to run a test chart: its identity, its default
//! values and runtime options, and the scratch directory the rendered files live in.
//!
//! Loading a chart:
//! 1. resolves the reference (directory, archive or URL) to a local directory;
//! 2. reads `metadata.yaml`, `values.yaml` and the optional `runtime.yaml`;
//! 3. renders every file under `templates/` into a fresh scratch directory, keeping
//!    relative paths but dropping the `templates` segment;
//! 4. copies `static/` verbatim to `<scratch>/static`.
//!
//! The scratch directory is removed by [`Chart::cleanup`], by the next [`Chart::load`],
//! or when the chart is dropped. A chart can instead borrow an existing directory
//! ([`Chart::set_runner_directory`]); borrowed directories are never removed.

use crate::constants::{
    METADATA_FILENAME, RUNTIME_FILENAME, SCRATCH_PREFIX, STATIC_DIR, TEMPLATES_DIR,
    VALUES_FILENAME,
};
use crate::core::acquire::{self, AcquireError};
use crate::core::renderer::{RenderContext, RenderError, Renderer};
use crate::core::values::{self, ValuesError};
use crate::models::ChartMetadata;
use crate::system::fs::{CopyError, copy_tree};
use log::{debug, info};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error(transparent)]
    Acquisition(#[from] AcquireError),
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
    #[error("Chart metadata '{}' has an empty name", .path.display())]
    MetadataName { path: PathBuf },
    #[error("Chart '{}' has no '{}' directory", .path.display(), TEMPLATES_DIR)]
    MissingTemplates { path: PathBuf },
    #[error("Failed to load chart defaults: {0}")]
    Defaults(#[source] ValuesError),
    #[error("Failed to load chart runtime options: {0}")]
    Runtime(#[source] ValuesError),
    #[error("Failed to render template '{}': {source}", .path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to walk templates of '{}': {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error("Failed to create scratch directory under '{}': {source}", .path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Chart '{name}' has no execution directory; load it first")]
    NotLoaded { name: String },
}

/// What the runner needs from a chart.
pub trait RunnableChart {
    fn name(&self) -> &str;
    /// Where commands run. `None` until the chart is loaded.
    fn runner_directory(&self) -> Option<&Path>;
    /// The raw `runtime.yaml` mapping, decoded by the runner.
    fn runtime_defaults(&self) -> &Mapping;
}

#[derive(Debug)]
enum ExecutionDirectory {
    Owned(TempDir),
    Borrowed(PathBuf),
}

impl ExecutionDirectory {
    fn path(&self) -> &Path {
        match self {
            Self::Owned(dir) => dir.path(),
            Self::Borrowed(path) => path,
        }
    }
}

#[derive(Debug, Default)]
pub struct Chart {
    metadata: ChartMetadata,
    defaults: Mapping,
    runtime_defaults: Mapping,
    values: Mapping,
    execution_dir: Option<ExecutionDirectory>,
}

impl Chart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires and materializes `chart_ref`, rendering templates with the chart
    /// defaults coalesced with `values` (caller wins).
    ///
    /// Any previous execution directory is released first. On error the chart keeps
    /// no scratch directory.
    pub fn load(
        &mut self,
        chart_ref: &str,
        values: &Mapping,
        renderer: &dyn Renderer,
        scratch_root: &Path,
    ) -> Result<(), ChartError> {
        self.cleanup()?;

        let source = acquire::acquire(chart_ref, scratch_root)?;
        let chart_dir = source.path();

        self.load_meta(chart_dir)?;
        self.values = values::coalesce(&self.defaults, values);

        fs::create_dir_all(scratch_root).map_err(|source| ChartError::Scratch {
            path: scratch_root.to_path_buf(),
            source,
        })?;
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(scratch_root)
            .map_err(|source| ChartError::Scratch {
                path: scratch_root.to_path_buf(),
                source,
            })?;
        debug!("Created execution directory '{}'", scratch.path().display());

        self.render_templates(chart_dir, scratch.path(), renderer)?;

        let static_dir = chart_dir.join(STATIC_DIR);
        if static_dir.is_dir() {
            copy_tree(&static_dir, &scratch.path().join(STATIC_DIR)).map_err(ChartError::Copy)?;
        }

        info!(
            "Loaded chart '{}' ({}) into '{}'",
            self.metadata.name,
            self.metadata.version,
            scratch.path().display()
        );
        self.execution_dir = Some(ExecutionDirectory::Owned(scratch));
        Ok(())
    }

    /// Reads `metadata.yaml`, `values.yaml` and the optional `runtime.yaml` of `chart_dir`.
    pub fn load_meta(&mut self, chart_dir: &Path) -> Result<(), ChartError> {
        self.metadata = read_metadata(chart_dir)?;

        let values_path = chart_dir.join(VALUES_FILENAME);
        self.defaults = read_mapping(&values_path).map_err(ChartError::Defaults)?;

        let runtime_path = chart_dir.join(RUNTIME_FILENAME);
        self.runtime_defaults = if runtime_path.is_file() {
            read_mapping(&runtime_path).map_err(ChartError::Runtime)?
        } else {
            Mapping::new()
        };
        Ok(())
    }

    /// Prepares an already rendered directory (e.g. the output of `charty template`)
    /// to be run in place.
    ///
    /// `metadata.yaml` and `runtime.yaml` are both optional here: without metadata the
    /// chart is named after the directory.
    pub fn load_rendered(&mut self, dir: &Path) -> Result<(), ChartError> {
        self.cleanup()?;
        self.metadata = if dir.join(METADATA_FILENAME).is_file() {
            read_metadata(dir)?
        } else {
            ChartMetadata {
                name: dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| dir.display().to_string()),
                version: String::new(),
            }
        };
        let runtime_path = dir.join(RUNTIME_FILENAME);
        self.runtime_defaults = if runtime_path.is_file() {
            read_mapping(&runtime_path).map_err(ChartError::Runtime)?
        } else {
            Mapping::new()
        };
        self.set_runner_directory(dir);
        Ok(())
    }

    /// Borrows `dir` as the execution directory. It will not be removed by cleanup.
    pub fn set_runner_directory(&mut self, dir: &Path) {
        self.execution_dir = Some(ExecutionDirectory::Borrowed(dir.to_path_buf()));
    }

    pub fn runner_directory(&self) -> Option<&Path> {
        self.execution_dir.as_ref().map(ExecutionDirectory::path)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn metadata(&self) -> &ChartMetadata {
        &self.metadata
    }

    /// The chart's own `values.yaml`.
    pub fn defaults(&self) -> &Mapping {
        &self.defaults
    }

    /// The values templates were rendered with.
    pub fn values(&self) -> &Mapping {
        &self.values
    }

    pub fn runtime_defaults(&self) -> &Mapping {
        &self.runtime_defaults
    }

    /// Copies the execution directory to `dest`, plus `metadata.yaml` and `runtime.yaml`
    /// so the copy can be resumed later. Files rendered under those names are kept.
    pub fn export(&self, dest: &Path) -> Result<(), ChartError> {
        let source = self.runner_directory().ok_or_else(|| ChartError::NotLoaded {
            name: self.metadata.name.clone(),
        })?;
        copy_tree(source, dest).map_err(ChartError::Copy)?;

        let metadata_path = dest.join(METADATA_FILENAME);
        if !metadata_path.exists() {
            write_yaml(&metadata_path, &self.metadata)?;
        }
        let runtime_path = dest.join(RUNTIME_FILENAME);
        if !runtime_path.exists() && !self.runtime_defaults.is_empty() {
            write_yaml(&runtime_path, &Value::Mapping(self.runtime_defaults.clone()))?;
        }
        Ok(())
    }

    /// Removes an owned execution directory. Safe to call any number of times.
    pub fn cleanup(&mut self) -> Result<(), ChartError> {
        match self.execution_dir.take() {
            Some(ExecutionDirectory::Owned(dir)) => {
                let path = dir.path().to_path_buf();
                debug!("Removing execution directory '{}'", path.display());
                dir.close().map_err(|source| ChartError::Io { path, source })
            }
            Some(ExecutionDirectory::Borrowed(path)) => {
                debug!("Leaving borrowed directory '{}' in place", path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn render_templates(
        &self,
        chart_dir: &Path,
        scratch: &Path,
        renderer: &dyn Renderer,
    ) -> Result<(), ChartError> {
        let templates = chart_dir.join(TEMPLATES_DIR);
        if !templates.is_dir() {
            return Err(ChartError::MissingTemplates {
                path: chart_dir.to_path_buf(),
            });
        }
        let context = RenderContext {
            values: &self.values,
            chart: &self.metadata,
        };

        for entry in WalkDir::new(&templates).sort_by_file_name() {
            let entry = entry.map_err(|source| ChartError::Walk {
                path: templates.clone(),
                source,
            })?;
            let relative = entry.path().strip_prefix(&templates).unwrap_or(entry.path());
            let target = scratch.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|source| ChartError::Io {
                    path: target.clone(),
                    source,
                })?;
                continue;
            }

            let template = fs::read_to_string(entry.path()).map_err(|source| ChartError::Io {
                path: relative.to_path_buf(),
                source,
            })?;
            let rendered =
                renderer
                    .render(&template, &context)
                    .map_err(|source| ChartError::Render {
                        path: relative.to_path_buf(),
                        source,
                    })?;
            fs::write(&target, rendered).map_err(|source| ChartError::Io {
                path: relative.to_path_buf(),
                source,
            })?;
            copy_permissions(entry.path(), &target);
            debug!("Rendered '{}'", relative.display());
        }
        Ok(())
    }
}

impl RunnableChart for Chart {
    fn name(&self) -> &str {
        Self::name(self)
    }

    fn runner_directory(&self) -> Option<&Path> {
        Self::runner_directory(self)
    }

    fn runtime_defaults(&self) -> &Mapping {
        Self::runtime_defaults(self)
    }
}

fn read_metadata(chart_dir: &Path) -> Result<ChartMetadata, ChartError> {
    let path = chart_dir.join(METADATA_FILENAME);
    let content = fs::read_to_string(&path).map_err(|source| ChartError::MetadataRead {
        path: path.clone(),
        source,
    })?;
    let metadata: ChartMetadata =
        serde_yaml::from_str(&content).map_err(|source| ChartError::MetadataParse {
            path: path.clone(),
            source,
        })?;
    if metadata.name.trim().is_empty() {
        return Err(ChartError::MetadataName { path });
    }
    Ok(metadata)
}

fn read_mapping(path: &Path) -> Result<Mapping, ValuesError> {
    let content = fs::read_to_string(path).map_err(|source| ValuesError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    values::parse_document(&content, &path.display().to_string())
}

fn write_yaml<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ChartError> {
    let io_err = |source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    };
    let content = serde_yaml::to_string(value).map_err(|e| io_err(io::Error::other(e)))?;
    fs::write(path, content).map_err(io_err)
}

/// Keeps the executable bit of rendered scripts.
fn copy_permissions(from: &Path, to: &Path) {
    if let Ok(meta) = fs::metadata(from) {
        if let Err(e) = fs::set_permissions(to, meta.permissions()) {
            debug!("Could not copy permissions to '{}': {}", to.display(), e);
        }
    }
}

impl Drop for Chart {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!("{}", e);
        }
    }
}
