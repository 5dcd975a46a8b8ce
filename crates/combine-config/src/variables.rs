//! Template variable resolution.
//!
//! Each entry under `variables:` is either a literal value or a source
//! description:
//!
//! ```yaml
//! variables:
//!   site_name: Example
//!   api_key:
//!     default: dev-key
//!     from_env: API_KEY
//!   nav:
//!     from_file: data/nav.yml
//! ```
//!
//! Sources apply in order `default`, `from_env`, `from_file`; a later source
//! wins when it is available. A `from_file` path that does not exist is
//! skipped, so a missing file only surfaces when a template uses the variable.

use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::ConfigError;

/// Resolved template variables keyed by name.
pub type Variables = BTreeMap<String, Value>;

/// Resolve the raw `variables:` mapping.
///
/// Relative `from_file` paths are resolved against `base_dir`.
pub(crate) fn resolve(raw: &Mapping, base_dir: &Path) -> Result<Variables, ConfigError> {
    let mut variables = Variables::new();

    for (key, data) in raw {
        let Some(name) = key.as_str() else {
            return Err(ConfigError::Validation(format!(
                "variable names must be strings, found {key:?}"
            )));
        };

        match data {
            Value::Mapping(source) => {
                if let Some(value) = resolve_source(name, source, base_dir)? {
                    variables.insert(name.to_owned(), value);
                }
            }
            other => {
                variables.insert(name.to_owned(), other.clone());
            }
        }
    }

    Ok(variables)
}

fn resolve_source(
    name: &str,
    source: &Mapping,
    base_dir: &Path,
) -> Result<Option<Value>, ConfigError> {
    let mut value = source.get("default").cloned();

    if let Some(env_name) = source.get("from_env").and_then(Value::as_str)
        && let Ok(env_value) = std::env::var(env_name)
    {
        value = Some(Value::String(env_value));
    }

    if let Some(filename) = source.get("from_file").and_then(Value::as_str) {
        let path = base_dir.join(filename);
        if path.exists() {
            value = Some(read_variable_file(name, &path)?);
        } else {
            tracing::debug!(variable = name, path = %path.display(), "Variable file not found, skipping");
        }
    }

    Ok(value)
}

/// Load a variable from a file: YAML and JSON are parsed, anything else is raw text.
fn read_variable_file(name: &str, path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let parsed = match extension {
        "yml" | "yaml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(&content).map_err(|e| e.to_string()),
        _ => Ok(Value::String(content)),
    };

    parsed.map_err(|message| ConfigError::VariableFile {
        name: name.to_owned(),
        path: path.to_path_buf(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_literal_values() {
        let vars = resolve(&mapping("title: Site\ncount: 3\nflags: [a, b]"), Path::new(".")).unwrap();
        assert_eq!(vars["title"], Value::from("Site"));
        assert_eq!(vars["count"], Value::from(3));
        assert!(vars["flags"].is_sequence());
    }

    #[test]
    fn test_default_source() {
        let vars = resolve(&mapping("key:\n  default: fallback"), Path::new(".")).unwrap();
        assert_eq!(vars["key"], Value::from("fallback"));
    }

    #[test]
    fn test_source_without_value_is_unset() {
        let vars = resolve(
            &mapping("key:\n  from_env: COMBINE_TEST_NEVER_SET"),
            Path::new("."),
        )
        .unwrap();
        assert!(!vars.contains_key("key"));
    }

    #[test]
    fn test_env_overrides_default() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("COMBINE_TEST_VAR_ENV", "from-env");
        }
        let vars = resolve(
            &mapping("key:\n  default: fallback\n  from_env: COMBINE_TEST_VAR_ENV"),
            Path::new("."),
        )
        .unwrap();
        assert_eq!(vars["key"], Value::from("from-env"));
        unsafe {
            std::env::remove_var("COMBINE_TEST_VAR_ENV");
        }
    }

    #[test]
    fn test_from_file_formats() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nav.yml"), "- home\n- about\n").unwrap();
        std::fs::write(dir.path().join("data.json"), r#"{"version": 2}"#).unwrap();
        std::fs::write(dir.path().join("banner.txt"), "Hello!\n").unwrap();

        let vars = resolve(
            &mapping(
                "nav:\n  from_file: nav.yml\ndata:\n  from_file: data.json\nbanner:\n  from_file: banner.txt",
            ),
            dir.path(),
        )
        .unwrap();

        assert_eq!(vars["nav"], serde_yaml::from_str::<Value>("[home, about]").unwrap());
        assert_eq!(vars["data"]["version"], Value::from(2));
        assert_eq!(vars["banner"], Value::from("Hello!\n"));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let vars = resolve(
            &mapping("nav:\n  default: []\n  from_file: missing.yml"),
            dir.path(),
        )
        .unwrap();
        assert_eq!(vars["nav"], Value::Sequence(Vec::new()));
    }

    #[test]
    fn test_invalid_json_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        let err = resolve(&mapping("bad:\n  from_file: bad.json"), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::VariableFile { ref name, .. } if name == "bad"));
    }

    #[test]
    fn test_non_string_key_rejected() {
        let err = resolve(&mapping("1: one"), Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
