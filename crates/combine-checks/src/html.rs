//! Checks over a rendered HTML document.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::issue::Issue;

macro_rules! selector {
    ($css:literal) => {
        LazyLock::new(|| Selector::parse($css).unwrap())
    };
}

static TITLE: LazyLock<Selector> = selector!("title");
static META_DESCRIPTION: LazyLock<Selector> = selector!(r#"meta[name="description"]"#);
static IMG: LazyLock<Selector> = selector!("img");
static WITH_ID: LazyLock<Selector> = selector!("[id]");
static MIXED_CONTENT: LazyLock<Selector> = selector!("img[src], iframe[src], link[href]");
static LINKED: LazyLock<Selector> = selector!("a[href], img[src], script[src], link[href]");

/// Open Graph properties every page should declare.
const OPEN_GRAPH_PROPERTIES: &[&str] = &["title", "description", "type", "url", "image", "site_name"];

/// Link prefixes that never point into the output directory.
const EXTERNAL_PREFIXES: &[&str] = &[
    "//", "http:", "https:", "tel:", "mailto:", "ftp:", "file:", "data:", "javascript:", "#",
];

const META_DESCRIPTION_LENGTH: std::ops::RangeInclusive<usize> = 50..=320;

/// Run every HTML check on `html`, written to `output_path` inside `output_dir`.
pub fn check_html(html: &str, output_path: &Path, output_dir: &Path) -> Vec<Issue> {
    let document = Html::parse_document(html);

    let mut issues = Vec::new();
    issues.extend(title(&document));
    issues.extend(meta_description(&document));
    issues.extend(image_alt(&document));
    issues.extend(duplicate_id(&document));
    issues.extend(mixed_content(&document));
    issues.extend(internal_links(&document, output_path, output_dir));
    issues.extend(open_graph(&document));
    issues
}

fn title(document: &Html) -> Option<Issue> {
    let Some(title) = document.select(&TITLE).next() else {
        return Some(Issue::new("title-missing", "The title tag is missing."));
    };
    let text: String = title.text().collect();
    text.trim()
        .is_empty()
        .then(|| Issue::new("title-empty", "The title tag has no content."))
}

fn meta_description(document: &Html) -> Option<Issue> {
    // no description is fine, Open Graph checks cover social previews
    let meta = document.select(&META_DESCRIPTION).next()?;
    let content = meta.value().attr("content").unwrap_or_default();

    if content.is_empty() {
        return Some(
            Issue::new(
                "meta-description-empty",
                "The meta description tag is present, but has an empty value.",
            )
            .with_context("element", meta.html()),
        );
    }

    let length = content.chars().count();
    (!META_DESCRIPTION_LENGTH.contains(&length)).then(|| {
        Issue::new(
            "meta-description-length",
            "The meta description text should be between 50 and 320 characters.",
        )
        .with_context("length", length.to_string())
        .with_context("description", content)
    })
}

fn image_alt(document: &Html) -> Vec<Issue> {
    document
        .select(&IMG)
        .filter(|img| img.value().attr("alt").is_none())
        .map(|img| {
            Issue::new(
                "image-alt-missing",
                "All <img> tags should have alt text describing the image, or be set to an empty string (\"\").",
            )
            .with_context("element", img.html())
        })
        .collect()
}

fn duplicate_id(document: &Html) -> Vec<Issue> {
    let mut seen: BTreeMap<&str, Vec<ElementRef<'_>>> = BTreeMap::new();
    for element in document.select(&WITH_ID) {
        if let Some(id) = element.value().id().filter(|id| !id.is_empty()) {
            seen.entry(id).or_default().push(element);
        }
    }

    seen.into_iter()
        .filter(|(_, elements)| elements.len() > 1)
        .map(|(id, elements)| {
            let elements: Vec<String> = elements.iter().map(ElementRef::html).collect();
            Issue::new(
                "duplicate-id",
                "The same `id` should not be used on a page more than once.",
            )
            .with_context("id", id)
            .with_context("elements", elements.join("\n"))
        })
        .collect()
}

fn mixed_content(document: &Html) -> Vec<Issue> {
    document
        .select(&MIXED_CONTENT)
        .filter(|el| !(el.value().name() == "link" && el.value().attr("rel") == Some("profile")))
        .filter(|el| {
            let attr = if el.value().name() == "link" { "href" } else { "src" };
            el.value().attr(attr).is_some_and(|v| v.trim_start().starts_with("http:"))
        })
        .map(|el| {
            Issue::new(
                "https-mixed-content",
                "Any linked resources (CSS, img, iframes) should be linked via HTTPS.",
            )
            .with_context("element", el.html())
        })
        .collect()
}

fn internal_links(document: &Html, output_path: &Path, output_dir: &Path) -> Vec<Issue> {
    let base_dir = output_path.parent().unwrap_or(output_dir);

    document
        .select(&LINKED)
        .filter_map(|el| {
            let attr = match el.value().name() {
                "a" | "link" => "href",
                _ => "src",
            };
            let target = link_target(el.value().attr(attr)?, base_dir, output_dir)?;
            (!target.exists()).then(|| {
                let shown = target.strip_prefix(output_dir).unwrap_or(&target);
                Issue::new(
                    "internal-link-broken",
                    "You have a link that doesn't point to an existing file.",
                )
                .with_context("element", el.html())
                .with_context("target_path", shown.display().to_string())
            })
        })
        .collect()
}

/// Resolve a link value to the output file a web server would serve for it.
///
/// Returns `None` for empty and external links.
fn link_target(value: &str, base_dir: &Path, output_dir: &Path) -> Option<PathBuf> {
    let value = value.trim();
    let value = value.split(['?', '#']).next().unwrap_or_default();
    if value.is_empty() || EXTERNAL_PREFIXES.iter().any(|p| value.starts_with(p)) {
        return None;
    }

    let mut target = match value.strip_prefix('/') {
        Some(absolute) => output_dir.join(absolute),
        None => base_dir.join(value),
    };
    if value.ends_with('/') || target.extension().is_none() {
        target.push("index.html");
    }
    Some(normalize(&target))
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn open_graph(document: &Html) -> Vec<Issue> {
    let has_meta_description = document
        .select(&META_DESCRIPTION)
        .next()
        .and_then(|m| m.value().attr("content"))
        .is_some_and(|c| !c.is_empty());

    let mut issues = Vec::new();
    for property in OPEN_GRAPH_PROPERTIES {
        let content = open_graph_content(document, property);
        let slug = property.replace('_', "-");

        if content.is_empty() {
            // a plain meta description stands in for og:description
            if *property == "description" && has_meta_description {
                continue;
            }
            issues.push(Issue::new(
                format!("open-graph-{slug}-missing"),
                format!("The og:{slug} meta tag is missing."),
            ));
            continue;
        }

        if matches!(*property, "url" | "image") && !is_canonical(&content) {
            issues.push(
                Issue::new(
                    format!("open-graph-{slug}-not-canonical-https"),
                    format!("The og:{slug} should be an absolute, HTTPS url."),
                )
                .with_context("content", content),
            );
        }
    }
    issues
}

fn open_graph_content(document: &Html, property: &str) -> String {
    let css = format!(r#"meta[property="og:{property}"]"#);
    Selector::parse(&css)
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|m| m.value().attr("content").map(str::to_owned))
        })
        .unwrap_or_default()
}

/// Local development URLs are accepted alongside HTTPS.
fn is_canonical(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://127.0.0.1")
}
