//! Change watching and incremental rebuilds for Combine.
//!
//! [`watch`] starts a filesystem watcher over a [`Site`](combine_site::Site)
//! and feeds every change through a [`ChangeHandler`], which decides between
//! ignoring the change, rebuilding the affected files, or reloading and
//! rebuilding everything.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use std::sync::Arc;
//! use combine_config::CliSettings;
//! use combine_site::Site;
//!
//! let site = Arc::new(Site::load(Path::new("combine.yml"), CliSettings::default())?);
//! let _handle = combine_watch::watch(site, |event, handled| {
//!     println!("{} {}: {:?}", event.path.display(), event.kind, handled.decision.action);
//! })?;
//! # Ok(())
//! # }
//! ```

mod decision;
mod dedup;
mod event;
mod filter;
mod watcher;

pub use decision::{Action, ChangeHandler, Decision, Handled, Scope, StepRun, Target};
pub use dedup::{DEFAULT_WINDOW, DedupCache};
pub use event::{ChangeEvent, ChangeKind};
pub use filter::{PathClass, classify};
pub use watcher::{WatchError, WatchHandle, watch};
