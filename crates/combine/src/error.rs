//! CLI error types.

use combine_server::ServerError;
use combine_site::{BuildError, LoadError, ThemeError};
use combine_watch::WatchError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("{0}")]
    Build(#[from] BuildError),

    #[error("{0}")]
    Watch(#[from] WatchError),

    #[error("{0}")]
    Server(#[from] ServerError),

    #[error("{0}")]
    Theme(#[from] ThemeError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{count} {} failed", checks_noun(.count))]
    ChecksFailed { count: usize },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn checks_noun(count: &usize) -> &'static str {
    if *count == 1 { "check" } else { "checks" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_checks_failed_message() {
        assert_eq!(CliError::ChecksFailed { count: 1 }.to_string(), "1 check failed");
        assert_eq!(CliError::ChecksFailed { count: 3 }.to_string(), "3 checks failed");
    }
}
