//! Configuration management for Combine.
//!
//! Parses `combine.yml` with serde and resolves it into absolute paths,
//! template variables and build steps:
//!
//! ```yaml
//! output_path: output
//! content_paths:
//!   - content
//!   - theme/content
//! variables:
//!   site_name: Example
//! steps:
//!   - run: npm run build-css
//!     watch: ["./styles/*.css"]
//! ```
//!
//! CLI settings (`--env`, `--var`, the dev server's `base_url`) are applied
//! during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `output_path` and `content_paths` entries support `${VAR}` and
//! `${VAR:-default}`.

mod expand;
mod step;
mod variables;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

pub use step::{BuildStep, StepError, Watch};
pub use variables::Variables;

/// Configuration filename looked up in the project directory.
pub const CONFIG_FILENAME: &str = "combine.yml";

/// Environment name used when none is given.
pub const DEFAULT_ENV: &str = "production";

/// CLI settings that override configuration file values.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Build environment exposed to templates as `env`.
    pub env: Option<String>,
    /// Site base URL exposed to templates as `base_url`.
    pub base_url: Option<String>,
    /// `--var name=value` overrides, applied last.
    pub variables: Vec<(String, String)>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field (e.g., "`content_paths[0]`").
        field: String,
        /// Error message (e.g., "${`THEME_DIR`} not set").
        message: String,
    },
    /// A `from_file` variable source could not be parsed.
    #[error("Could not load variable {name} from {}: {message}", .path.display())]
    VariableFile {
        name: String,
        path: PathBuf,
        message: String,
    },
}

/// `combine.yml` as written.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    output_path: Option<String>,
    content_paths: Option<Vec<String>>,
    variables: Mapping,
    steps: Vec<BuildStep>,
}

/// Resolved site configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute path of the configuration file.
    pub config_path: PathBuf,
    /// Directory containing the configuration file.
    pub project_dir: PathBuf,
    /// Output directory for rendered files.
    pub output_path: PathBuf,
    /// Content roots, highest precedence first.
    pub content_paths: Vec<PathBuf>,
    /// Template variables (config sources plus CLI overrides).
    pub variables: Variables,
    /// Build steps in declared order.
    pub steps: Vec<BuildStep>,
    /// Build environment name.
    pub env: String,
}

impl Config {
    /// Load configuration from `config_path` with optional CLI settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist, or a
    /// parse/validation error if it cannot be resolved.
    pub fn load(config_path: &Path, cli_settings: Option<&CliSettings>) -> Result<Self, ConfigError> {
        if !config_path.is_file() {
            return Err(ConfigError::NotFound(config_path.to_path_buf()));
        }

        let content = std::fs::read_to_string(config_path)?;
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(&content)?
        };

        let config_path = std::path::absolute(config_path)?;
        let config = Self::from_raw(raw, config_path, cli_settings)?;
        tracing::debug!(
            output = %config.output_path.display(),
            roots = config.content_paths.len(),
            steps = config.steps.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Default configuration for a project directory, as if `combine.yml` were empty.
    pub fn default_with_base(project_dir: &Path) -> Self {
        let mut variables = Variables::new();
        variables.insert("env".to_owned(), Value::String(DEFAULT_ENV.to_owned()));

        Self {
            config_path: project_dir.join(CONFIG_FILENAME),
            project_dir: project_dir.to_path_buf(),
            output_path: project_dir.join("output"),
            content_paths: Self::default_content_paths(project_dir),
            variables,
            steps: Vec::new(),
            env: DEFAULT_ENV.to_owned(),
        }
    }

    fn from_raw(
        raw: RawConfig,
        config_path: PathBuf,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let project_dir = config_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let output_path = match raw.output_path.as_deref() {
            Some(path) => project_dir.join(expand::expand_env(path, "output_path")?),
            None => project_dir.join("output"),
        };

        let content_paths = match &raw.content_paths {
            Some(paths) => paths
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    expand::expand_env(p, &format!("content_paths[{i}]"))
                        .map(|p| project_dir.join(p))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Self::default_content_paths(&project_dir),
        };

        let env = cli_settings
            .and_then(|s| s.env.clone())
            .unwrap_or_else(|| DEFAULT_ENV.to_owned());

        let mut variables = Variables::new();
        variables.insert("env".to_owned(), Value::String(env.clone()));
        variables.extend(variables::resolve(&raw.variables, &project_dir)?);

        if let Some(settings) = cli_settings {
            if let Some(base_url) = &settings.base_url {
                variables.insert("base_url".to_owned(), Value::String(base_url.clone()));
            }
            for (name, value) in &settings.variables {
                variables.insert(name.clone(), Value::String(value.clone()));
            }
        }

        let config = Self {
            config_path,
            project_dir,
            output_path,
            content_paths,
            variables,
            steps: raw.steps,
            env,
        };
        config.validate()?;
        Ok(config)
    }

    /// `content`, plus `theme/content` when a theme is present.
    fn default_content_paths(project_dir: &Path) -> Vec<PathBuf> {
        let mut paths = vec![project_dir.join("content")];
        let theme = project_dir.join("theme").join("content");
        if theme.is_dir() {
            paths.push(theme);
        }
        paths
    }

    /// Validate resolved configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_paths.is_empty() {
            return Err(ConfigError::Validation(
                "content_paths cannot be empty".to_owned(),
            ));
        }

        if let Some(root) = self
            .content_paths
            .iter()
            .find(|root| self.output_path.starts_with(root))
        {
            return Err(ConfigError::Validation(format!(
                "output_path {} cannot be inside content path {}",
                self.output_path.display(),
                root.display()
            )));
        }

        for step in &self.steps {
            for pattern in step.watch_patterns() {
                let normalized = pattern.strip_prefix("./").unwrap_or(pattern);
                glob::Pattern::new(normalized).map_err(|e| {
                    ConfigError::Validation(format!("invalid watch pattern {pattern:?}: {e}"))
                })?;
            }
        }

        Ok(())
    }

    /// Run every step's `run` command in declared order.
    ///
    /// Stops at the first failing step.
    pub fn run_build_steps(&self) -> Result<(), StepError> {
        for step in self.steps.iter().filter(|s| s.has_run_command()) {
            step.run()?;
        }
        Ok(())
    }

    /// Whether `path` is this configuration file.
    pub fn is_config_file(&self, path: &Path) -> bool {
        path == self.config_path
    }
}
