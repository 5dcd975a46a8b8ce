//! Content catalog, rendering pipeline and build orchestration for Combine.
//!
//! This crate provides:
//! - [`Site`]: the reloadable site context holding the current [`SiteState`]
//! - [`Catalog`]: content roots walked into [`File`] entries
//! - [`Templates`]: the template environment with reference resolution
//! - [`build`]: full and partial builds with per-file error isolation
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::collections::HashSet;
//! use std::path::Path;
//! use combine_config::CliSettings;
//! use combine_site::Site;
//!
//! let site = Site::load(Path::new("combine.yml"), CliSettings::default())?;
//!
//! // Full build
//! let report = site.build(&HashSet::new())?;
//! report.ensure_success()?;
//!
//! // Rebuild whatever depends on a changed template
//! let state = site.reload()?;
//! let paths = state
//!     .affected_files("_base.html")
//!     .iter()
//!     .map(|f| f.path().to_path_buf())
//!     .collect();
//! site.build(&paths)?;
//! # Ok(())
//! # }
//! ```

pub mod build;
mod catalog;
mod file;
mod highlight;
pub mod markdown;
pub mod references;
mod render;
mod site;
mod templates;

pub use build::{BuildError, BuildReport, FileError, RenderedFile};
pub use catalog::{Catalog, CatalogError, ContentDirectory};
pub use file::{File, FileKind};
pub use highlight::{DEFAULT_THEME, ThemeError, theme_css, theme_names};
pub use render::RenderError;
pub use site::{LoadError, Site, SiteState};
pub use templates::{ERROR_TEMPLATE, MARKDOWN_TEMPLATE, REDIRECT_TEMPLATE, Templates};
