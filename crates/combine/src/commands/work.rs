//! `combine work` command implementation.
//!
//! Builds the site, then keeps it up to date while serving the output:
//! watch-command steps run for the whole session, the change watcher
//! rebuilds on every edit, and the server runs until Ctrl-C.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Child;
use std::sync::Arc;

use clap::Args;
use combine_config::{CONFIG_FILENAME, CliSettings, Config};
use combine_server::{DEFAULT_PORT, ServerConfig, run_server};
use combine_site::Site;
use combine_watch::{Action, ChangeEvent, Handled};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the work command.
#[derive(Args)]
pub(crate) struct WorkArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Port for the local server.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl WorkArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let settings = CliSettings {
            env: Some("development".to_owned()),
            base_url: Some(format!("http://127.0.0.1:{}", self.port)),
            ..CliSettings::default()
        };
        let site = Arc::new(Site::load(&self.config, settings)?);
        let state = site.state();

        output.step("Building site");
        match site.build(&HashSet::new()) {
            Ok(report) => {
                output.render_errors(&report);
                output.check_report(&combine_checks::run(&report, &state.config().output_path));
                if !report.is_success() {
                    output.error("Build error (see above)");
                }
            }
            Err(e) => output.error(&format!("Build error: {e}")),
        }

        let mut children = spawn_watch_steps(state.config(), &output);

        let _watch = combine_watch::watch(Arc::clone(&site), {
            let output = Output::new();
            move |event, handled| report_change(&output, event, handled)
        })?;

        output.banner(&banner(self.port));

        let server_config = ServerConfig {
            port: self.port,
            root: state.config().output_path.clone(),
            ..ServerConfig::default()
        };
        let runtime = tokio::runtime::Runtime::new()?;
        let result = runtime.block_on(run_server(server_config, shutdown_signal()));

        for child in &mut children {
            if let Err(e) = child.kill().and_then(|()| child.wait().map(drop)) {
                tracing::warn!(pid = child.id(), error = %e, "Failed to stop watch process");
            }
        }

        result?;
        Ok(())
    }
}

/// Start every step whose `watch` is a long-running command.
fn spawn_watch_steps(config: &Config, output: &Output) -> Vec<Child> {
    config
        .steps
        .iter()
        .filter_map(|step| match step.spawn_watch() {
            Ok(child) => {
                if child.is_some() {
                    output.step(&format!("Running {} in the background", step.name()));
                }
                child
            }
            Err(e) => {
                output.error(&format!("Failed to start {}: {e}", step.name()));
                None
            }
        })
        .collect()
}

fn report_change(output: &Output, event: &ChangeEvent, handled: &Handled) {
    for run in &handled.decision.steps {
        output.step(&format!("Running step for matching {}", run.pattern));
        if let Err(e) = &run.result {
            output.error(&format!("There was an error running a user command: {e}"));
        }
    }

    let timestamp = chrono::Local::now().format("%-I:%M%p").to_string().to_lowercase();
    match &handled.decision.action {
        Action::Rebuild { subject, scope } => {
            output.step(&format!("{subject} {} ({timestamp}): {scope}", event.kind));
        }
        Action::ReloadFailed { subject, error } => {
            output.step(&format!("{subject} {} ({timestamp})", event.kind));
            output.error(&format!("There was an error reloading the site: {error}"));
        }
        Action::Ignore | Action::OutputAsset | Action::Unrelated | Action::Skip { .. } => {}
    }

    match &handled.build {
        Some(Ok(report)) => {
            output.render_errors(report);
            if !report.is_success() {
                output.error("Build error (see above)");
            }
        }
        Some(Err(e)) => output.error(&format!("Build error: {e}")),
        None => {}
    }
}

fn banner(port: u16) -> String {
    format!(
        "\n  Site is live: http://127.0.0.1:{port}\n  Docs: https://combine.dropseed.dev\n\n  Watching for file changes...\n"
    )
}

/// Wait for Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
