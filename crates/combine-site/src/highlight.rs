//! Syntax highlighting for fenced code blocks.
//!
//! Code is highlighted into `<span>`s carrying scope class names, so the
//! colors come from a stylesheet. [`theme_css`] produces one for any bundled
//! theme, scoped under `.highlight`.

use std::sync::LazyLock;

use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Theme used when none is given.
pub const DEFAULT_THEME: &str = "InspiredGitHub";

/// Error returned when theme CSS cannot be produced.
#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    /// No bundled theme with this name.
    #[error("Unknown theme {name:?} (available: {})", available.join(", "))]
    Unknown { name: String, available: Vec<String> },
    /// Theme could not be converted to CSS.
    #[error("Cannot generate CSS: {0}")]
    Css(#[from] syntect::Error),
}

/// Names of the bundled themes.
pub fn theme_names() -> Vec<String> {
    THEME_SET.themes.keys().cloned().collect()
}

/// Stylesheet for `name`, with every selector nested under `.highlight`.
pub fn theme_css(name: &str) -> Result<String, ThemeError> {
    let theme = THEME_SET.themes.get(name).ok_or_else(|| ThemeError::Unknown {
        name: name.to_owned(),
        available: theme_names(),
    })?;

    let css = css_for_theme_with_class_style(theme, ClassStyle::Spaced)?;
    Ok(css
        .lines()
        .map(|line| match line.strip_suffix('{') {
            Some(selectors) if !line.trim_start().starts_with("/*") => {
                let scoped: Vec<String> = selectors
                    .split(',')
                    .map(|s| format!(".highlight {}", s.trim()))
                    .collect();
                format!("{} {{", scoped.join(", "))
            }
            _ => line.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Highlight `code` as `lang`, falling back to plain text for unknown languages.
pub(crate) fn highlight_block(code: &str, lang: &str) -> String {
    let syntax = SYNTAX_SET
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());

    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, ClassStyle::Spaced);
    let body = match LinesWithEndings::from(code)
        .try_for_each(|line| generator.parse_html_for_line_which_includes_newline(line))
    {
        Ok(()) => generator.finalize(),
        Err(e) => {
            tracing::debug!(lang, error = %e, "Highlighting failed, emitting plain code");
            escape_html(code)
        }
    };

    let class = if lang.is_empty() {
        String::new()
    } else {
        format!(r#" class="language-{}""#, escape_html(lang))
    };
    format!("<div class=\"highlight\"><pre><code{class}>{body}</code></pre></div>\n")
}

/// Escape HTML special characters.
pub(crate) fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_known_language() {
        let html = highlight_block("fn main() {}\n", "rust");
        assert!(html.starts_with(r#"<div class="highlight"><pre><code class="language-rust">"#));
        assert!(html.contains("<span class=\""));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_highlight_unknown_language_escapes() {
        let html = highlight_block("<b>&</b>\n", "no-such-language");
        assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
    }

    #[test]
    fn test_theme_css_scoped() {
        let css = theme_css(DEFAULT_THEME).unwrap();
        let rules: Vec<_> = css.lines().filter(|l| l.ends_with('{')).collect();
        assert!(!rules.is_empty());
        assert!(rules.iter().all(|r| r.starts_with(".highlight ")));
    }

    #[test]
    fn test_unknown_theme() {
        let err = theme_css("no-such-theme").unwrap_err();
        assert!(matches!(err, ThemeError::Unknown { .. }));
        assert!(theme_names().contains(&DEFAULT_THEME.to_owned()));
    }
}
