//! Deciding what to rebuild after a change.
//!
//! Each event goes through the same procedure:
//!
//! 1. Noise and output-directory paths are dropped, then repeats within the
//!    dedup window.
//! 2. Build steps whose watch patterns match the path run their `run`
//!    command. Failures are reported and do not stop processing.
//! 3. A change to the configuration file reloads the site and rebuilds
//!    everything.
//! 4. Paths outside every content root need nothing more.
//! 5. A deleted or moved content path reloads the site and rebuilds
//!    everything.
//! 6. A created or modified content path reloads the site first, so the
//!    reference graph reflects the edit, then rebuilds the changed file and
//!    every file referencing it. No affected files means a full rebuild; only
//!    ignored files means nothing to write.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use combine_config::{Config, StepError};
use combine_site::{BuildError, BuildReport, LoadError, Site, SiteState};

use crate::dedup::DedupCache;
use crate::event::{ChangeEvent, ChangeKind};
use crate::filter::{self, PathClass};

/// A watch-pattern step run triggered by a change.
#[derive(Debug)]
pub struct StepRun {
    pub name: String,
    pub pattern: String,
    pub result: Result<(), StepError>,
}

/// A file selected for a partial rebuild.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub source: PathBuf,
    pub content_relative_path: String,
}

/// What a rebuild covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Full,
    Files(Vec<Target>),
}

impl Scope {
    /// Source paths to pass to a build. Empty for a full build.
    pub fn only_paths(&self) -> HashSet<PathBuf> {
        match self {
            Self::Full => HashSet::new(),
            Self::Files(targets) => targets.iter().map(|t| t.source.clone()).collect(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("Rebuilding entire site"),
            Self::Files(targets) => match targets.as_slice() {
                [target] => write!(f, "Rebuilding {}", target.content_relative_path),
                targets => write!(f, "Rebuilding {} files", targets.len()),
            },
        }
    }
}

/// Outcome of the decision procedure for one event.
#[derive(Debug)]
pub enum Action {
    /// Noise, output-directory content or a repeated event.
    Ignore,
    /// A stylesheet or script in the output directory changed.
    OutputAsset,
    /// The path is neither the configuration file nor content.
    Unrelated,
    /// Every affected file is ignored, so no output changes.
    Skip { subject: String },
    /// Reloading the site failed. The previous snapshot stays current.
    ReloadFailed { subject: String, error: LoadError },
    /// Rebuild `scope` in response to a change to `subject`.
    Rebuild { subject: String, scope: Scope },
}

/// Result of [`ChangeHandler::decide`].
#[derive(Debug)]
pub struct Decision {
    /// Watch-pattern steps run for this event.
    pub steps: Vec<StepRun>,
    pub action: Action,
}

impl Decision {
    fn new(action: Action) -> Self {
        Self {
            steps: Vec::new(),
            action,
        }
    }
}

/// Result of [`ChangeHandler::handle`].
#[derive(Debug)]
pub struct Handled {
    pub decision: Decision,
    /// Present when the decision asked for a rebuild.
    pub build: Option<Result<BuildReport, BuildError>>,
}

/// Turns change events into reloads and rebuilds of one site.
pub struct ChangeHandler {
    site: Arc<Site>,
    dedup: DedupCache,
}

impl ChangeHandler {
    pub fn new(site: Arc<Site>) -> Self {
        Self::with_dedup(site, DedupCache::default())
    }

    pub fn with_dedup(site: Arc<Site>, dedup: DedupCache) -> Self {
        Self { site, dedup }
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    /// Decide and carry out the rebuild for `event`.
    pub fn handle(&mut self, event: &ChangeEvent) -> Handled {
        let decision = self.decide(event);
        let build = match &decision.action {
            Action::Rebuild { scope, .. } => {
                let result = self.site.build(&scope.only_paths());
                if let Err(e) = &result {
                    tracing::error!(error = %e, "Rebuild failed");
                }
                Some(result)
            }
            _ => None,
        };
        Handled { decision, build }
    }

    /// Run the decision procedure for `event`, reloading the site as needed.
    pub fn decide(&mut self, event: &ChangeEvent) -> Decision {
        let state = self.site.state();
        let config = state.config();

        match filter::classify(&event.path, config) {
            PathClass::Ignored => return Decision::new(Action::Ignore),
            PathClass::OutputAsset => return Decision::new(Action::OutputAsset),
            PathClass::Source => {}
        }
        // children of a modified directory report their own changes
        if event.kind == ChangeKind::Modified && event.path.is_dir() {
            return Decision::new(Action::Ignore);
        }
        if self.dedup.is_duplicate(event) {
            tracing::debug!(path = %event.path.display(), kind = %event.kind, "Dropping repeated event");
            return Decision::new(Action::Ignore);
        }

        let steps = run_matching_steps(&state, event);

        let action = if config.is_config_file(&event.path) {
            let subject = event.path.display().to_string();
            match self.reload(&subject) {
                Ok(_) => Action::Rebuild {
                    subject,
                    scope: Scope::Full,
                },
                Err(action) => action,
            }
        } else {
            match state.content_relative_path(&event.path) {
                Some(subject) if !subject.is_empty() => self.content_change(event.kind, subject),
                _ => Action::Unrelated,
            }
        };

        tracing::debug!(path = %event.path.display(), kind = %event.kind, ?action, "Decided change");
        Decision { steps, action }
    }

    fn content_change(&self, kind: ChangeKind, subject: String) -> Action {
        let state = match self.reload(&subject) {
            Ok(state) => state,
            Err(action) => return action,
        };
        if kind.is_removal() {
            return Action::Rebuild {
                subject,
                scope: Scope::Full,
            };
        }

        let affected = state.affected_files(&subject);
        if affected.is_empty() {
            return Action::Rebuild {
                subject,
                scope: Scope::Full,
            };
        }
        if affected.iter().all(|f| f.kind().is_ignored()) {
            return Action::Skip { subject };
        }

        let targets = affected
            .iter()
            .map(|f| Target {
                source: f.path().to_path_buf(),
                content_relative_path: f.content_relative_path().to_owned(),
            })
            .collect();
        Action::Rebuild {
            subject,
            scope: Scope::Files(targets),
        }
    }

    fn reload(&self, subject: &str) -> Result<Arc<SiteState>, Action> {
        let before = self.site.state();
        let state = self.site.reload().map_err(|error| {
            tracing::error!(error = %error, "Failed to reload site");
            Action::ReloadFailed {
                subject: subject.to_owned(),
                error,
            }
        })?;

        let stale = settings_needing_restart(before.config(), state.config());
        if !stale.is_empty() {
            tracing::warn!(
                settings = ?stale,
                "Changed settings are not picked up by the running watcher and server until restart"
            );
        }
        Ok(state)
    }
}

/// Settings the watcher and server read once at startup that differ between `before` and `after`.
fn settings_needing_restart(before: &Config, after: &Config) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if before.output_path != after.output_path {
        changed.push("output_path");
    }
    if before.content_paths != after.content_paths {
        changed.push("content_paths");
    }
    changed
}

fn run_matching_steps(state: &SiteState, event: &ChangeEvent) -> Vec<StepRun> {
    let config = state.config();
    config
        .steps
        .iter()
        .filter(|step| step.has_run_command())
        .filter_map(|step| {
            let pattern = step.matching_pattern(&event.path, &config.project_dir)?;
            tracing::info!(step = step.name(), pattern, "Running step for matching path");
            let result = step.run();
            if let Err(e) = &result {
                tracing::warn!(step = step.name(), error = %e, "Watch step failed");
            }
            Some(StepRun {
                name: step.name().to_owned(),
                pattern: pattern.to_owned(),
                result,
            })
        })
        .collect()
}
