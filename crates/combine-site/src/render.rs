//! Per-kind rendering and reference loading.
//!
//! [`render_file`] writes one file's output artifact and refreshes its
//! reference set. [`load_references`] computes the same reference set without
//! rendering, for the load pass that follows a reload.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{Value, context};

use crate::file::{File, FileKind};
use crate::markdown::{self, Document};
use crate::templates::{ERROR_TEMPLATE, MARKDOWN_TEMPLATE, REDIRECT_TEMPLATE, Templates};

/// Lines of template source shown on either side of a failing line.
const CONTEXT_LINES: usize = 3;

/// Error returned when a single file cannot be rendered.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Template lookup, parsing or evaluation failed.
    #[error(transparent)]
    Template(#[from] minijinja::Error),
    /// Markdown front matter is not a YAML mapping.
    #[error("Invalid front matter in {}: {source}", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    /// Source file cannot be read.
    #[error("Cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Output file cannot be written.
    #[error("Cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render `file` into `output_dir`.
///
/// Returns the written path, or `None` for files without output.
pub fn render_file(
    file: &File,
    templates: &Templates,
    output_dir: &Path,
) -> Result<Option<PathBuf>, RenderError> {
    let (Some(relative), Some(url)) = (file.output_relative_path(), file.url()) else {
        return Ok(None);
    };
    let target = output_dir.join(relative);

    match file.kind() {
        FileKind::Ignored { .. } => return Ok(None),
        FileKind::Plain => {
            create_parent(&target)?;
            fs::copy(file.path(), &target).map_err(|source| RenderError::Write {
                path: target.clone(),
                source,
            })?;
        }
        FileKind::Html => {
            let html = templates.render(file.content_relative_path(), context! { url => url })?;
            write_output(&target, &html)?;
            let source = read_source(file.path())?;
            file.set_references(templates.references_in_source(&source));
        }
        FileKind::Markdown => {
            let document = read_document(file.path())?;
            let template = document.template().unwrap_or(MARKDOWN_TEMPLATE).to_owned();

            let mut variables: BTreeMap<String, Value> = document
                .metadata
                .iter()
                .map(|(key, value)| (key.clone(), Value::from_serialize(value)))
                .collect();
            variables.insert("url".to_owned(), Value::from(url));
            variables.insert(
                "content".to_owned(),
                Value::from_safe_string(markdown::to_html(&document.body)),
            );

            let html = templates.render(&template, Value::from_serialize(&variables))?;
            write_output(&target, &html)?;
            file.set_references(templates.resolve_references([template]));
        }
        FileKind::Redirect => {
            let source = read_source(file.path())?;
            let html = templates.render(
                REDIRECT_TEMPLATE,
                context! { redirect_url => source.trim(), url => url },
            )?;
            write_output(&target, &html)?;
            file.set_references(templates.resolve_references([REDIRECT_TEMPLATE.to_owned()]));
        }
    }

    tracing::debug!(
        source = file.content_relative_path(),
        output = relative,
        "Rendered file"
    );
    Ok(Some(target))
}

/// Reference set of `file` against the current templates, without rendering it.
///
/// Sources that cannot be read or parsed yield an empty set; the error
/// surfaces when the file is rendered.
pub fn load_references(file: &File, templates: &Templates) -> BTreeSet<String> {
    match file.kind() {
        FileKind::Html | FileKind::Ignored { template: true } => match read_source(file.path()) {
            Ok(source) => templates.references_in_source(&source),
            Err(_) => BTreeSet::new(),
        },
        FileKind::Markdown => match read_document(file.path()) {
            Ok(document) => {
                let template = document.template().unwrap_or(MARKDOWN_TEMPLATE).to_owned();
                templates.resolve_references([template])
            }
            Err(e) => {
                tracing::debug!(source = file.content_relative_path(), error = %e, "Skipping references");
                BTreeSet::new()
            }
        },
        FileKind::Redirect => templates.resolve_references([REDIRECT_TEMPLATE.to_owned()]),
        FileKind::Plain | FileKind::Ignored { template: false } => BTreeSet::new(),
    }
}

/// Write an error page for `file` at its output path.
pub fn render_error_page(
    file: &File,
    error: &RenderError,
    templates: &Templates,
    output_dir: &Path,
) -> Result<Option<PathBuf>, RenderError> {
    let Some(relative) = file.output_relative_path() else {
        return Ok(None);
    };
    let target = output_dir.join(relative);

    let html = templates.render(
        ERROR_TEMPLATE,
        context! {
            error => error.to_string(),
            relative_path => file.content_relative_path(),
            context_lines => context_lines(error, templates),
            excinfo => error_chain(error),
        },
    )?;
    write_output(&target, &html)?;
    Ok(Some(target))
}

/// Source lines around the failing line of a template error.
fn context_lines(error: &RenderError, templates: &Templates) -> String {
    let RenderError::Template(e) = error else {
        return String::new();
    };
    let (Some(name), Some(line)) = (e.name(), e.line()) else {
        return String::new();
    };
    let Some(source) = templates.source(name) else {
        return String::new();
    };

    let first = line.saturating_sub(CONTEXT_LINES).max(1);
    source
        .lines()
        .enumerate()
        .skip(first - 1)
        .take(line + CONTEXT_LINES + 1 - first)
        .map(|(i, text)| format!("{:>4} {text}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The error followed by each of its sources.
fn error_chain(error: &RenderError) -> String {
    let mut text = match error {
        RenderError::Template(e) => format!("{e:#}"),
        other => other.to_string(),
    };
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        text.push_str("\n\ncaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn read_source(path: &Path) -> Result<String, RenderError> {
    fs::read_to_string(path).map_err(|source| RenderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_document(path: &Path) -> Result<Document, RenderError> {
    Document::parse(&read_source(path)?).map_err(|source| RenderError::FrontMatter {
        path: path.to_path_buf(),
        source,
    })
}

fn create_parent(target: &Path) -> Result<(), RenderError> {
    match target.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|source| RenderError::Write {
            path: parent.to_path_buf(),
            source,
        }),
        None => Ok(()),
    }
}

fn write_output(target: &Path, content: &str) -> Result<(), RenderError> {
    create_parent(target)?;
    fs::write(target, content).map_err(|source| RenderError::Write {
        path: target.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use combine_config::Config;
    use pretty_assertions::assert_eq;

    struct Fixture {
        dir: tempfile::TempDir,
        templates: Templates,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            for (path, content) in files {
                let path = dir.path().join("content").join(path);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, content).unwrap();
            }
            let config = Config::default_with_base(dir.path());
            let templates = Templates::new(&config);
            Self { dir, templates }
        }

        fn file(&self, relative: &str) -> File {
            let root = self.dir.path().join("content");
            File::new(&root, root.join(relative))
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("output")
        }

        fn render(&self, relative: &str) -> Result<Option<PathBuf>, RenderError> {
            render_file(&self.file(relative), &self.templates, &self.output())
        }

        fn read_output(&self, relative: &str) -> String {
            fs::read_to_string(self.output().join(relative)).unwrap()
        }
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[test]
    fn test_plain_copy() {
        let fixture = Fixture::new(&[("assets/logo.svg", "<svg/>"), ("robots.txt.keep", "User-agent: *")]);
        let written = fixture.render("assets/logo.svg").unwrap().unwrap();
        assert_eq!(written, fixture.output().join("assets/logo.svg"));
        assert_eq!(fixture.read_output("assets/logo.svg"), "<svg/>");

        fixture.render("robots.txt.keep").unwrap();
        assert_eq!(fixture.read_output("robots.txt"), "User-agent: *");
    }

    #[test]
    fn test_html_render_with_url_and_references() {
        let fixture = Fixture::new(&[
            ("_base.html", "<main>{% block body %}{% endblock %}</main>"),
            ("about.html", r#"{% extends "_base.html" %}{% block body %}{{ url|safe }}{% endblock %}"#),
        ]);
        let file = fixture.file("about.html");
        render_file(&file, &fixture.templates, &fixture.output()).unwrap();

        assert_eq!(fixture.read_output("about/index.html"), "<main>/about/</main>");
        assert_eq!(file.references(), set(&["_base.html"]));
    }

    #[test]
    fn test_markdown_default_template() {
        let fixture = Fixture::new(&[("post.md", "---\ntitle: Hello\n---\n# Heading\n")]);
        let file = fixture.file("post.md");
        render_file(&file, &fixture.templates, &fixture.output()).unwrap();

        let html = fixture.read_output("post/index.html");
        assert!(html.contains("<title>Hello</title>"));
        assert!(html.contains(r#"<h1 id="heading">Heading</h1>"#));
        assert_eq!(file.references(), set(&[MARKDOWN_TEMPLATE]));
    }

    #[test]
    fn test_markdown_template_override() {
        let fixture = Fixture::new(&[
            ("custom.html", "[{{ title }}|{{ url|safe }}]{{ content }}"),
            ("post.md", "---\ntemplate: custom.html\ntitle: T\n---\nbody\n"),
        ]);
        let file = fixture.file("post.md");
        render_file(&file, &fixture.templates, &fixture.output()).unwrap();

        assert_eq!(fixture.read_output("post/index.html"), "[T|/post/]<p>body</p>\n");
        assert_eq!(file.references(), set(&["custom.html"]));
        assert_eq!(load_references(&file, &fixture.templates), set(&["custom.html"]));
    }

    #[test]
    fn test_redirect() {
        let fixture = Fixture::new(&[("old-page.redirect", "  /new-page\n")]);
        let file = fixture.file("old-page.redirect");
        render_file(&file, &fixture.templates, &fixture.output()).unwrap();

        let expected = fixture
            .templates
            .render(REDIRECT_TEMPLATE, context! { redirect_url => "/new-page", url => "/old-page/" })
            .unwrap();
        assert_eq!(fixture.read_output("old-page/index.html"), expected);
        assert!(expected.contains("new-page"));
        assert_eq!(file.references(), set(&[REDIRECT_TEMPLATE]));
    }

    #[test]
    fn test_ignored_writes_nothing() {
        let fixture = Fixture::new(&[("_nav.html", "nav")]);
        assert_eq!(fixture.render("_nav.html").unwrap(), None);
        assert!(!fixture.output().exists());
    }

    #[test]
    fn test_template_only_file_loads_references() {
        let fixture = Fixture::new(&[
            ("_nav.html", "nav"),
            ("page.template.html", r#"{% include "_nav.html" %}"#),
        ]);
        let file = fixture.file("page.template.html");
        assert_eq!(load_references(&file, &fixture.templates), set(&["_nav.html"]));
    }

    #[test]
    fn test_error_page_with_context() {
        let fixture = Fixture::new(&[("broken.html", "one\ntwo\n{{ missing }}\nfour\n")]);
        let file = fixture.file("broken.html");
        let error = render_file(&file, &fixture.templates, &fixture.output()).unwrap_err();
        assert!(matches!(error, RenderError::Template(_)));

        render_error_page(&file, &error, &fixture.templates, &fixture.output()).unwrap();
        let html = fixture.read_output("broken/index.html");
        assert!(html.contains("Error rendering broken.html"));
        assert!(html.contains("   3 {{ missing }}"));
        assert!(html.contains("   1 one"));
    }

    #[test]
    fn test_invalid_front_matter_is_render_error() {
        let fixture = Fixture::new(&[("bad.md", "---\n[oops\n---\n")]);
        let err = fixture.render("bad.md").unwrap_err();
        assert!(matches!(err, RenderError::FrontMatter { .. }));
    }
}
