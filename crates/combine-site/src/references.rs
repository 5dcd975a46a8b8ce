//! Static template reference extraction.
//!
//! References are found by scanning template source for `include`, `extends`,
//! `import` and `from` tags and `include_raw(...)` calls. Every string literal
//! in a tag's expression counts as a candidate name, so both branches of
//! `"_a.html" if wide else "_b.html"` and the fallback in
//! `layout or "_base.html"` are seen. Nothing is executed, so templates that
//! are only included conditionally still count. Literals that do not name a
//! template are dropped by [`resolve`]. Targets computed at render time
//! cannot be seen.
//!
//! Comments (`{# ... #}`) and `{% raw %}` blocks are removed before scanning.

use std::collections::{BTreeSet, VecDeque};
use std::sync::LazyLock;

use regex::Regex;

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{#.*?#\}").unwrap());

static RAW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%[-+]?\s*raw\s*[-+]?%\}.*?\{%[-+]?\s*endraw\s*[-+]?%\}").unwrap()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{%[-+]?\s*(?:include|extends|import|from)\s+(.*?)\s*[-+]?%\}").unwrap()
});

static INCLUDE_RAW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"include_raw\(\s*("(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*')"#).unwrap());

static STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'"#).unwrap());

/// Template names referenced directly by `source`.
pub fn direct_references(source: &str) -> BTreeSet<String> {
    let source = COMMENT_RE.replace_all(source, "");
    let source = RAW_RE.replace_all(&source, "");

    let mut names = BTreeSet::new();

    for caps in TAG_RE.captures_iter(&source) {
        names.extend(string_literals(&caps[1]));
    }

    for caps in INCLUDE_RAW_RE.captures_iter(&source) {
        names.extend(string_literals(&caps[1]));
    }

    names
}

fn string_literals(text: &str) -> impl Iterator<Item = String> + '_ {
    STRING_RE.captures_iter(text).map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map_or_else(String::new, |m| m.as_str().to_owned())
    })
}

/// Transitive closure of the references reachable from `seeds`.
///
/// `lookup` returns a template's source, or `None` when the name does not
/// resolve. Unresolved names are left out of the result. Each template is
/// scanned at most once, so include cycles terminate.
pub fn resolve<I, F>(seeds: I, mut lookup: F) -> BTreeSet<String>
where
    I: IntoIterator<Item = String>,
    F: FnMut(&str) -> Option<String>,
{
    let mut resolved = BTreeSet::new();
    let mut queue: VecDeque<String> = seeds.into_iter().collect();

    while let Some(name) = queue.pop_front() {
        if resolved.contains(&name) {
            continue;
        }
        let Some(source) = lookup(&name) else {
            tracing::debug!(template = %name, "Dropping unresolved reference");
            continue;
        };
        queue.extend(
            direct_references(&source)
                .into_iter()
                .filter(|r| !resolved.contains(r)),
        );
        resolved.insert(name);
    }

    resolved
}
