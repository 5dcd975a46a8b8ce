//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod utils;
pub(crate) mod work;

pub(crate) use build::BuildArgs;
pub(crate) use utils::UtilsCommand;
pub(crate) use work::WorkArgs;

/// Parse a `--var name=value` pair.
pub(crate) fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected NAME=VALUE, got {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("title=My Site").unwrap(),
            ("title".to_owned(), "My Site".to_owned())
        );
        assert_eq!(
            parse_var("query=a=b").unwrap(),
            ("query".to_owned(), "a=b".to_owned())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }
}
