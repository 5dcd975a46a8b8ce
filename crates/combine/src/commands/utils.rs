//! `combine utils` commands.

use std::io::Write;

use clap::{Args, Subcommand};
use combine_site::{DEFAULT_THEME, theme_css};

use crate::error::CliError;

/// Utility commands.
#[derive(Subcommand)]
pub(crate) enum UtilsCommand {
    /// Output the CSS for highlighted code, to customize in your site.
    HighlightCss(HighlightCssArgs),
}

impl UtilsCommand {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        match self {
            Self::HighlightCss(args) => args.execute(),
        }
    }
}

#[derive(Args)]
pub(crate) struct HighlightCssArgs {
    /// Highlighting theme.
    #[arg(long, default_value = DEFAULT_THEME)]
    style: String,
}

impl HighlightCssArgs {
    fn execute(self) -> Result<(), CliError> {
        let css = theme_css(&self.style)?;
        std::io::stdout().lock().write_all(css.as_bytes())?;
        Ok(())
    }
}
