//! Environment variable expansion for path settings.
//!
//! `output_path` and every entry of `content_paths` may reference the
//! environment with `${VAR}` or `${VAR:-default}`. Bare `$VAR` is left alone so
//! that paths containing a literal dollar sign keep working.

use crate::ConfigError;

/// Expand `${VAR}` references in a path setting.
///
/// `field` names the setting in error messages (e.g. `content_paths[1]`).
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, UnsetVar> {
        std::env::var(var).map(Some).map_err(|_| UnsetVar(var.to_owned()))
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} not set", e.cause.0),
    })
}

/// Name of a variable that was referenced but not set.
struct UnsetVar(String);
