//! `combine build` command implementation.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::Args;
use combine_config::{CONFIG_FILENAME, CliSettings};
use combine_site::Site;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Run checks on the output and fail when any issue is found.
    #[arg(long)]
    check: bool,

    /// Value of the `env` template variable.
    #[arg(long, default_value = combine_config::DEFAULT_ENV)]
    env: String,

    /// Set a template variable (repeatable).
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = super::parse_var)]
    vars: Vec<(String, String)>,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl BuildArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let settings = CliSettings {
            env: Some(self.env),
            variables: self.vars,
            ..CliSettings::default()
        };
        let site = Site::load(&self.config, settings)?;

        output.step("Building site");
        let report = site.build(&HashSet::new())?;
        output.render_errors(&report);

        let checks = self
            .check
            .then(|| combine_checks::run(&report, &site.state().config().output_path));
        if let Some(checks) = &checks {
            output.check_report(checks);
        }

        report.ensure_success()?;

        if let Some(checks) = checks {
            if !checks.is_empty() {
                return Err(CliError::ChecksFailed {
                    count: checks.len(),
                });
            }
            output.success("✓ All checks passed");
        }
        Ok(())
    }
}
