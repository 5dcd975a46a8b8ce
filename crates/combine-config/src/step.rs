//! Build steps: external commands attached to the build.
//!
//! A step may carry a `run` command (executed once per full build) and a
//! `watch` setting, which is either a long-running command started for a
//! `work` session or a list of glob patterns that re-trigger `run` when a
//! matching path changes.

use std::path::Path;
use std::process::{Child, Command, ExitStatus};

use glob::Pattern;
use serde::Deserialize;

/// What a step watches.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(
    untagged,
    expecting = "watch must be a string (command) or list of strings (paths to watch)"
)]
pub enum Watch {
    /// Long-running command started alongside `combine work`.
    Command(String),
    /// Glob patterns; a change to a matching path re-runs the step's `run` command.
    Patterns(Vec<String>),
}

/// A configured build step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct BuildStep {
    /// Command executed during every full build.
    #[serde(default)]
    pub run: Option<String>,
    /// Watch command or watch patterns.
    #[serde(default)]
    pub watch: Option<Watch>,
}

/// Error returned when a step command cannot be run or fails.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// The step has no `run` command.
    #[error("No run command specified")]
    NoRunCommand,
    /// The command line is empty or cannot be split into words.
    #[error("Invalid command: {0:?}")]
    InvalidCommand(String),
    /// The process could not be started.
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// The process exited unsuccessfully.
    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: ExitStatus },
}

impl BuildStep {
    /// Short display name: the executable name of the watch or run command.
    ///
    /// `./node_modules/.bin/tailwindcss -o out.css` becomes `tailwindcss`.
    pub fn name(&self) -> &str {
        self.watch_command()
            .or(self.run.as_deref())
            .and_then(|cmd| cmd.split_whitespace().next())
            .and_then(|exe| exe.rsplit('/').next())
            .unwrap_or("")
    }

    /// Whether a `run` command is configured.
    pub fn has_run_command(&self) -> bool {
        self.run.as_deref().is_some_and(|cmd| !cmd.trim().is_empty())
    }

    /// The long-running watch command, if `watch` is a string.
    pub fn watch_command(&self) -> Option<&str> {
        match &self.watch {
            Some(Watch::Command(cmd)) => Some(cmd),
            _ => None,
        }
    }

    /// Watch patterns, empty unless `watch` is a list.
    pub fn watch_patterns(&self) -> &[String] {
        match &self.watch {
            Some(Watch::Patterns(patterns)) => patterns,
            _ => &[],
        }
    }

    /// Run the `run` command to completion.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Failed`] for a non-zero exit status.
    pub fn run(&self) -> Result<(), StepError> {
        let line = self.run.as_deref().ok_or(StepError::NoRunCommand)?;
        tracing::info!(step = self.name(), command = line, "Running build step");

        let status = command_for(line)?
            .status()
            .map_err(|source| StepError::Spawn {
                command: line.to_owned(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(StepError::Failed {
                command: line.to_owned(),
                status,
            })
        }
    }

    /// Start the watch command as a background process.
    ///
    /// Returns `Ok(None)` when `watch` is not a command.
    pub fn spawn_watch(&self) -> Result<Option<Child>, StepError> {
        let Some(line) = self.watch_command() else {
            return Ok(None);
        };
        tracing::info!(step = self.name(), command = line, "Starting watch process");

        command_for(line)?
            .spawn()
            .map(Some)
            .map_err(|source| StepError::Spawn {
                command: line.to_owned(),
                source,
            })
    }

    /// Return the first watch pattern that matches `path`.
    ///
    /// Patterns starting with `/` match the absolute path. Patterns starting
    /// with `./` and bare patterns match the path relative to `project_dir`.
    pub fn matching_pattern(&self, path: &Path, project_dir: &Path) -> Option<&str> {
        let relative = path.strip_prefix(project_dir).unwrap_or(path);

        self.watch_patterns()
            .iter()
            .find(|raw| {
                let (pattern, candidate) = if raw.starts_with('/') {
                    (raw.as_str(), path)
                } else {
                    (raw.strip_prefix("./").unwrap_or(raw), relative)
                };
                let matched = Pattern::new(pattern).is_ok_and(|p| p.matches_path(candidate));
                tracing::debug!(path = %path.display(), pattern = %raw, matched, "Checked watch pattern");
                matched
            })
            .map(String::as_str)
    }
}

/// Split a command line into a [`Command`] without going through a shell.
fn command_for(line: &str) -> Result<Command, StepError> {
    let words = shlex::split(line).filter(|w| !w.is_empty());
    let Some((program, args)) = words.as_deref().and_then(<[String]>::split_first) else {
        return Err(StepError::InvalidCommand(line.to_owned()));
    };

    let mut command = Command::new(program);
    command.args(args);
    Ok(command)
}
