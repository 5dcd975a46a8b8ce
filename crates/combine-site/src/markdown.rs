//! Markdown documents: front matter and HTML conversion.

use std::collections::{BTreeMap, HashMap};

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_yaml::Value;

use crate::highlight::highlight_block;

/// Front matter key selecting the layout template.
const TEMPLATE_KEY: &str = "template";

/// A Markdown source split into front matter and body.
#[derive(Debug, Default, PartialEq)]
pub struct Document {
    /// Front matter keys, passed to the template as variables.
    pub metadata: BTreeMap<String, Value>,
    /// Markdown after the front matter.
    pub body: String,
}

impl Document {
    /// Split `text` into YAML front matter (between `---` lines) and body.
    ///
    /// Text without a front matter block is all body.
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let Some((yaml, body)) = split_front_matter(text) else {
            return Ok(Self {
                metadata: BTreeMap::new(),
                body: text.to_owned(),
            });
        };

        let metadata = if yaml.trim().is_empty() {
            BTreeMap::new()
        } else {
            serde_yaml::from_str(yaml)?
        };

        Ok(Self {
            metadata,
            body: body.to_owned(),
        })
    }

    /// Template requested by the front matter, if any.
    pub fn template(&self) -> Option<&str> {
        self.metadata.get(TEMPLATE_KEY).and_then(Value::as_str)
    }
}

fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let first_line_end = text.find('\n')?;
    if text[..first_line_end].trim_end() != "---" {
        return None;
    }

    let rest = &text[first_line_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Convert Markdown to HTML.
///
/// Supports tables, strikethrough and fenced code. Code blocks are syntax
/// highlighted and headings get slug `id`s for anchors.
pub fn to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut events: Vec<Event<'_>> = Vec::new();
    let mut code: Option<(String, String)> = None;
    let mut heading: Option<HeadingBuffer<'_>> = None;
    let mut ids = HeadingIds::default();

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or("").to_owned()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                code = Some((lang, String::new()));
            }
            Event::Text(text) if code.is_some() => {
                if let Some((_, buffer)) = code.as_mut() {
                    buffer.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, buffer)) = code.take() {
                    events.push(Event::Html(CowStr::from(highlight_block(&buffer, &lang))));
                }
            }
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                heading = Some(HeadingBuffer {
                    level,
                    id,
                    classes,
                    attrs,
                    text: String::new(),
                    inner: Vec::new(),
                });
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(buffer) = heading.take() {
                    buffer.flush(&mut ids, &mut events);
                }
            }
            other => match heading.as_mut() {
                Some(buffer) => {
                    if let Event::Text(text) | Event::Code(text) = &other {
                        buffer.text.push_str(text);
                    }
                    buffer.inner.push(other);
                }
                None => events.push(other),
            },
        }
    }

    let mut html = String::with_capacity(markdown.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    html
}

struct HeadingBuffer<'a> {
    level: HeadingLevel,
    id: Option<CowStr<'a>>,
    classes: Vec<CowStr<'a>>,
    attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
    text: String,
    inner: Vec<Event<'a>>,
}

impl<'a> HeadingBuffer<'a> {
    fn flush(self, ids: &mut HeadingIds, events: &mut Vec<Event<'a>>) {
        let id = self
            .id
            .unwrap_or_else(|| CowStr::from(ids.generate(&self.text)));
        events.push(Event::Start(Tag::Heading {
            level: self.level,
            id: Some(id),
            classes: self.classes,
            attrs: self.attrs,
        }));
        events.extend(self.inner);
        events.push(Event::End(TagEnd::Heading(self.level)));
    }
}

/// Unique heading ids within one document.
#[derive(Default)]
struct HeadingIds {
    counts: HashMap<String, usize>,
}

impl HeadingIds {
    fn generate(&mut self, text: &str) -> String {
        let base_id = slugify(text);
        let count = self.counts.entry(base_id.clone()).or_default();
        let id = match *count {
            0 => base_id,
            n => format!("{base_id}-{n}"),
        };
        *count += 1;
        id
    }
}

/// Lowercase, dash-separated ASCII slug.
fn slugify(text: &str) -> String {
    let mut result = String::new();
    let mut last_was_dash = true;

    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && (c.is_whitespace() || c == '-' || c == '_') {
            result.push('-');
            last_was_dash = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }

    result
}
