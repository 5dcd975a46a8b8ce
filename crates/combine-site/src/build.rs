//! Build orchestration over one site snapshot.
//!
//! A build renders catalog files into the output directory:
//!
//! 1. Full builds (empty `only_paths`) delete and recreate the output
//!    directory; partial builds only make sure it exists. Template sources
//!    are read fresh for every build.
//! 2. Files are visited in catalog order. The first file to claim an output
//!    path owns it for the whole build, so earlier content roots shadow later
//!    ones. Claims are made for every file, including those a partial build
//!    skips, so shadowing does not depend on which files are rebuilt.
//! 3. A file that fails to render gets an error page at its output path and is
//!    recorded in the report. The rest of the batch continues.
//! 4. Full builds then run the configured build steps in order. A failing step
//!    aborts the build.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use combine_config::StepError;

use crate::render::{self, RenderError};
use crate::site::SiteState;

/// A file written by a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedFile {
    /// Absolute source path.
    pub source: PathBuf,
    pub content_relative_path: String,
    /// Absolute path of the written artifact.
    pub output_path: PathBuf,
}

/// A file that failed to render.
#[derive(Debug)]
pub struct FileError {
    /// Absolute source path.
    pub source: PathBuf,
    pub content_relative_path: String,
    pub error: RenderError,
}

/// Outcome of a build that ran to completion.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Whether this was a full build.
    pub full: bool,
    /// Successfully rendered files, in render order.
    pub rendered: Vec<RenderedFile>,
    /// Per-file failures. Each has an error page in place of its output.
    pub errors: Vec<FileError>,
}

impl BuildReport {
    /// Whether every file rendered.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turn recorded per-file failures into a single build error.
    pub fn ensure_success(&self) -> Result<(), BuildError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(BuildError::RenderFailed {
                count: self.errors.len(),
            })
        }
    }
}

/// Error that stops a build or marks it as failed.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The output directory cannot be cleaned or created.
    #[error("Cannot prepare output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A build step failed during a full build.
    #[error("Build step failed: {0}")]
    Step(#[from] StepError),
    /// One or more files failed to render.
    #[error("{count} file(s) failed to render")]
    RenderFailed { count: usize },
}

/// Build `state` into its output directory.
///
/// An empty `only_paths` means a full build. Otherwise only files whose
/// absolute source path is listed are rendered.
pub fn build(state: &SiteState, only_paths: &HashSet<PathBuf>) -> Result<BuildReport, BuildError> {
    let output_dir = state.config().output_path.as_path();
    let full = only_paths.is_empty();
    prepare_output_dir(output_dir, full)?;
    state.templates().clear_cache();

    let mut report = BuildReport {
        full,
        ..BuildReport::default()
    };
    let mut claimed: HashSet<&str> = HashSet::new();

    for file in state.catalog().files() {
        let Some(output) = file.output_relative_path() else {
            continue;
        };
        if !claimed.insert(output) {
            tracing::debug!(
                source = %file.path().display(),
                output,
                "Output path already claimed, skipping"
            );
            continue;
        }
        if !full && !only_paths.contains(file.path()) {
            continue;
        }

        match render::render_file(file, state.templates(), output_dir) {
            Ok(Some(output_path)) => report.rendered.push(RenderedFile {
                source: file.path().to_path_buf(),
                content_relative_path: file.content_relative_path().to_owned(),
                output_path,
            }),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(source = file.content_relative_path(), error = %error, "Failed to render file");
                if let Err(e) = render::render_error_page(file, &error, state.templates(), output_dir) {
                    tracing::warn!(source = file.content_relative_path(), error = %e, "Failed to render error page");
                }
                report.errors.push(FileError {
                    source: file.path().to_path_buf(),
                    content_relative_path: file.content_relative_path().to_owned(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        full,
        rendered = report.rendered.len(),
        errors = report.errors.len(),
        "Rendered site"
    );

    if full {
        state.config().run_build_steps()?;
    }

    Ok(report)
}

fn prepare_output_dir(output_dir: &Path, clean: bool) -> Result<(), BuildError> {
    let to_error = |source| BuildError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    };

    if clean && output_dir.exists() {
        fs::remove_dir_all(output_dir).map_err(to_error)?;
    }
    fs::create_dir_all(output_dir).map_err(to_error)
}
