//! Template environment built from the site configuration.
//!
//! Template names are content-relative paths. A name is looked up in each
//! content root in order and falls back to the built-in templates, so a site
//! can override `markdown.template.html` and friends by shipping its own.
//! Undefined variables are errors, and `.html`/`.xml` templates auto-escape
//! `&`, `<`, `>` and quotes. Slashes are left alone so URLs print as written.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use chrono::{Datelike, Timelike};
use combine_config::Config;
use minijinja::{
    AutoEscape, Environment, Error, ErrorKind, Output, State, UndefinedBehavior, Value,
    escape_formatter,
};
use url::Url;
use serde::Serialize;

use crate::markdown;
use crate::references;

/// Layout used for Markdown files without a `template` key.
pub const MARKDOWN_TEMPLATE: &str = "markdown.template.html";

/// Template for `.redirect` stubs.
pub const REDIRECT_TEMPLATE: &str = "redirect.template.html";

/// Template for per-file error pages.
pub const ERROR_TEMPLATE: &str = "error.template.html";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (ERROR_TEMPLATE, include_str!("builtin/error.template.html")),
    (MARKDOWN_TEMPLATE, include_str!("builtin/markdown.template.html")),
    (REDIRECT_TEMPLATE, include_str!("builtin/redirect.template.html")),
];

/// Resolves template names against the content roots, then the built-ins.
#[derive(Debug)]
struct TemplateLoader {
    roots: Vec<PathBuf>,
}

impl TemplateLoader {
    fn source(&self, name: &str) -> std::io::Result<Option<String>> {
        let Some(relative) = safe_relative_path(name) else {
            return Ok(None);
        };

        for root in &self.roots {
            let path = root.join(&relative);
            if path.is_file() {
                return fs::read_to_string(path).map(Some);
            }
        }

        Ok(BUILTIN_TEMPLATES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, source)| (*source).to_owned()))
    }
}

/// Turn a template name into a relative path, refusing anything that could escape a root.
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    if name.starts_with('/') || name.contains('\\') {
        return None;
    }
    let mut path = PathBuf::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            segment => path.push(segment),
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}

/// The template environment for one site snapshot.
///
/// Compiled templates are cached until [`Templates::clear_cache`].
pub struct Templates {
    env: RwLock<Environment<'static>>,
    loader: Arc<TemplateLoader>,
}

impl Templates {
    /// Build the environment: loader, globals, filters and functions.
    pub fn new(config: &Config) -> Self {
        let loader = Arc::new(TemplateLoader {
            roots: config.content_paths.clone(),
        });

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_formatter(html_formatter);

        let source_loader = Arc::clone(&loader);
        env.set_loader(move |name| {
            source_loader.source(name).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template {name}"),
                )
                .with_source(e)
            })
        });

        for (name, value) in &config.variables {
            env.add_global(name.clone(), Value::from_serialize(value));
        }

        let raw_loader = Arc::clone(&loader);
        env.add_function("include_raw", move |name: &str| -> Result<Value, Error> {
            match raw_loader.source(name) {
                Ok(Some(source)) => Ok(Value::from_safe_string(source)),
                Ok(None) => Err(Error::new(
                    ErrorKind::TemplateNotFound,
                    format!("template {name:?} does not exist"),
                )),
                Err(e) => Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("could not read template {name}"),
                )
                .with_source(e)),
            }
        });
        env.add_function("now", now);
        env.add_filter("markdown", markdown_filter);
        env.add_filter("absolute_url", absolute_url);

        Self {
            env: RwLock::new(env),
            loader,
        }
    }

    /// Render template `name` with `context`.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn render(&self, name: &str, context: Value) -> Result<String, Error> {
        let env = self.env.read().unwrap();
        env.get_template(name)?.render(context)
    }

    /// Drop compiled templates so the next render reads sources from disk again.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn clear_cache(&self) {
        self.env.write().unwrap().clear_templates();
    }

    /// Source text of template `name`, `None` if it does not resolve.
    pub fn source(&self, name: &str) -> Option<String> {
        match self.loader.source(name) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(template = name, error = %e, "Failed to read template");
                None
            }
        }
    }

    /// Whether `name` resolves to a template.
    pub fn exists(&self, name: &str) -> bool {
        self.source(name).is_some()
    }

    /// Every template reachable from `seeds`, the seeds included when they resolve.
    pub fn resolve_references<I>(&self, seeds: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = String>,
    {
        references::resolve(seeds, |name| self.source(name))
    }

    /// Every template reachable from the references in `source`.
    pub fn references_in_source(&self, source: &str) -> BTreeSet<String> {
        self.resolve_references(references::direct_references(source))
    }
}

#[derive(Serialize)]
struct Now {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    date: String,
    isoformat: String,
}

/// `now()`: the current local time.
fn now() -> Value {
    let now = chrono::Local::now();
    Value::from_serialize(Now {
        year: now.year(),
        month: now.month(),
        day: now.day(),
        hour: now.hour(),
        minute: now.minute(),
        second: now.second(),
        date: now.format("%Y-%m-%d").to_string(),
        isoformat: now.to_rfc3339(),
    })
}

/// Auto-escape strings in HTML templates the way markupsafe does: `/` is kept.
fn html_formatter(out: &mut Output, state: &State, value: &Value) -> Result<(), Error> {
    match value.as_str() {
        Some(text) if matches!(state.auto_escape(), AutoEscape::Html) && !value.is_safe() => {
            for c in text.chars() {
                match c {
                    '&' => out.write_str("&amp;")?,
                    '<' => out.write_str("&lt;")?,
                    '>' => out.write_str("&gt;")?,
                    '"' => out.write_str("&#34;")?,
                    '\'' => out.write_str("&#39;")?,
                    c => out.write_char(c)?,
                }
            }
            Ok(())
        }
        _ => escape_formatter(out, state, value),
    }
}

/// `{{ text | markdown }}`
fn markdown_filter(value: &str) -> Value {
    Value::from_safe_string(markdown::to_html(value))
}

/// `{{ "/feed.xml" | absolute_url }}`: join the `base_url` variable with a path.
fn absolute_url(state: &State, value: &str) -> Result<String, Error> {
    let base_url = state.lookup("base_url").ok_or_else(|| {
        Error::new(
            ErrorKind::UndefinedError,
            r#"The required variable "base_url" is missing"#,
        )
    })?;
    let base_url = base_url.as_str().unwrap_or_default();

    if base_url.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "absolute_url error: base_url can't be empty",
        ));
    }
    if value.is_empty() {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            "absolute_url error: url argument can't be empty",
        ));
    }

    let url = match (base_url.ends_with('/'), value.starts_with('/')) {
        (true, true) => format!("{base_url}{}", &value[1..]),
        (false, false) => format!("{base_url}/{value}"),
        _ => format!("{base_url}{value}"),
    };

    let has_host = Url::parse(&url)
        .is_ok_and(|parsed| parsed.host_str().is_some_and(|host| !host.is_empty()));
    if !has_host {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("absolute_url error: absolute url doesn't look valid\n{url}"),
        ));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn templates_for(root: &Path, variables: &[(&str, &str)]) -> Templates {
        let mut config = Config::default_with_base(root);
        config.content_paths = vec![root.join("content"), root.join("theme")];
        for (name, value) in variables {
            config
                .variables
                .insert((*name).to_owned(), serde_yaml::Value::from(*value));
        }
        Templates::new(&config)
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_roots_searched_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("content/page.html"), "content");
        write(&dir.path().join("theme/page.html"), "theme");
        write(&dir.path().join("theme/other.html"), "other");

        let templates = templates_for(dir.path(), &[]);
        assert_eq!(templates.render("page.html", context! {}).unwrap(), "content");
        assert_eq!(templates.render("other.html", context! {}).unwrap(), "other");
    }

    #[test]
    fn test_builtin_fallback_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let templates = templates_for(dir.path(), &[]);
        assert!(templates.exists(REDIRECT_TEMPLATE));
        assert!(!templates.exists("missing.html"));

        write(&dir.path().join("theme").join(REDIRECT_TEMPLATE), "custom {{ redirect_url }}");
        let templates = templates_for(dir.path(), &[]);
        assert_eq!(
            templates
                .render(REDIRECT_TEMPLATE, context! { redirect_url => "/new" })
                .unwrap(),
            "custom /new"
        );
    }

    #[test]
    fn test_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("secret.html"), "secret");
        let templates = templates_for(dir.path(), &[]);
        assert!(!templates.exists("../secret.html"));
        assert!(!templates.exists("/etc/passwd"));
    }

    #[test]
    fn test_strict_undefined() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("content/page.html"), "{{ missing }}");
        let templates = templates_for(dir.path(), &[]);
        let err = templates.render("page.html", context! {}).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedError);
    }

    #[test]
    fn test_globals_and_autoescape() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("content/page.html"), "{{ site_name }} {{ env }}");
        write(&dir.path().join("content/feed.txt"), "{{ site_name }}");
        let templates = templates_for(dir.path(), &[("site_name", "A & B")]);

        assert_eq!(
            templates.render("page.html", context! {}).unwrap(),
            "A &amp; B production"
        );
        assert_eq!(templates.render("feed.txt", context! {}).unwrap(), "A & B");
    }

    #[test]
    fn test_include_raw() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("content/snippet.js"), "if (a {{ b }}) {}");
        write(&dir.path().join("content/page.html"), r#"{{ include_raw("snippet.js") }}"#);
        let templates = templates_for(dir.path(), &[]);

        assert_eq!(
            templates.render("page.html", context! {}).unwrap(),
            "if (a {{ b }}) {}"
        );
    }

    #[test]
    fn test_markdown_filter() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("content/page.html"), "{{ text | markdown }}");
        let templates = templates_for(dir.path(), &[]);

        assert_eq!(
            templates.render("page.html", context! { text => "*hi*" }).unwrap(),
            "<p><em>hi</em></p>\n"
        );
    }

    #[test]
    fn test_absolute_url() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("content/page.html"), "{{ path | absolute_url }}");

        let templates = templates_for(dir.path(), &[("base_url", "https://example.com")]);
        for path in ["/feed.xml", "feed.xml"] {
            assert_eq!(
                templates.render("page.html", context! { path => path }).unwrap(),
                "https://example.com/feed.xml"
            );
        }

        let templates = templates_for(dir.path(), &[("base_url", "https://example.com/")]);
        assert_eq!(
            templates.render("page.html", context! { path => "/feed.xml" }).unwrap(),
            "https://example.com/feed.xml"
        );

        let templates = templates_for(dir.path(), &[("base_url", "")]);
        assert!(templates.render("page.html", context! { path => "/x" }).is_err());

        let templates = templates_for(dir.path(), &[("base_url", "example.com")]);
        assert!(templates.render("page.html", context! { path => "/x" }).is_err());

        let templates = templates_for(dir.path(), &[("base_url", "https://exa mple.com")]);
        assert!(templates.render("page.html", context! { path => "/x" }).is_err());

        let templates = templates_for(dir.path(), &[]);
        assert!(templates.render("page.html", context! { path => "/x" }).is_err());
    }

    #[test]
    fn test_now_function() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("content/page.html"),
            "{% if now().year > 2000 %}ok{% endif %} {{ now().date|length }}",
        );
        let templates = templates_for(dir.path(), &[]);
        assert_eq!(templates.render("page.html", context! {}).unwrap(), "ok 10");
    }

    #[test]
    fn test_html_escaping_keeps_slashes() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("content/page.html"), "<script>go({{ url }})</script>");
        let templates = templates_for(dir.path(), &[]);

        assert_eq!(
            templates
                .render("page.html", context! { url => "/about/?a=1&b='2'" })
                .unwrap(),
            "<script>go(/about/?a=1&amp;b=&#39;2&#39;)</script>"
        );
        assert_eq!(
            templates.render("page.html", context! { url => "<\"x\">" }).unwrap(),
            "<script>go(&lt;&#34;x&#34;&gt;)</script>"
        );
    }

    #[test]
    fn test_clear_cache_rereads_sources() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("content/page.html");
        write(&page, "first");
        let templates = templates_for(dir.path(), &[]);
        assert_eq!(templates.render("page.html", context! {}).unwrap(), "first");

        write(&page, "second");
        assert_eq!(templates.render("page.html", context! {}).unwrap(), "first");
        templates.clear_cache();
        assert_eq!(templates.render("page.html", context! {}).unwrap(), "second");
    }

    #[test]
    fn test_references_in_source() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("content/_base.html"), r#"{% include "_nav.html" %}"#);
        write(&dir.path().join("theme/_nav.html"), "nav");
        let templates = templates_for(dir.path(), &[]);

        let refs = templates.references_in_source(r#"{% extends "_base.html" %}{% include "_gone.html" %}"#);
        assert_eq!(
            refs,
            BTreeSet::from(["_base.html".to_owned(), "_nav.html".to_owned()])
        );
    }
}
