//! Content files and their output-path rules.
//!
//! Every regular file under a content root becomes a [`File`]. Its
//! [`FileKind`] is chosen from the file name alone and fixes where (and
//! whether) the file lands in the output directory:
//!
//! | Source              | Kind       | Output                |
//! |---------------------|------------|-----------------------|
//! | `_nav.html`         | Ignored    | none                  |
//! | `base.template.html`| Ignored    | none (template only)  |
//! | `index.html`        | Html       | `index.html`          |
//! | `about.html`        | Html       | `about/index.html`    |
//! | `404.keep.html`     | Html       | `404.html`            |
//! | `post.md`           | Markdown   | `post/index.html`     |
//! | `old.redirect`      | Redirect   | `old/index.html`      |
//! | `robots.txt.keep`   | Plain      | `robots.txt`          |
//! | `logo.png`          | Plain      | `logo.png`            |

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Second-to-last extension marking layout templates (`markdown.template.html`).
const TEMPLATE_MARKER: &str = "template";

/// Suffix that opts a file out of pretty URLs or strips itself from plain files.
const KEEP_MARKER: &str = "keep";

/// How a content file is turned into output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    /// Copied byte-for-byte.
    Plain,
    /// Rendered as a template.
    Html,
    /// Converted to HTML and rendered through a layout template.
    Markdown,
    /// Redirect stub pointing at the URL stored in the file.
    Redirect,
    /// Produces no output.
    ///
    /// `template` is set for `*.template.*` files, which are still scanned
    /// for references.
    Ignored { template: bool },
}

impl FileKind {
    /// Classify a file by its name.
    pub fn for_name(file_name: &str) -> Self {
        if file_name.starts_with('_') || file_name.starts_with('.') {
            return Self::Ignored { template: false };
        }

        let name = Path::new(file_name);
        let extension = name.extension().and_then(|e| e.to_str()).unwrap_or("");
        let stem_extension = name
            .file_stem()
            .map(Path::new)
            .and_then(Path::extension)
            .and_then(|e| e.to_str());

        if stem_extension == Some(TEMPLATE_MARKER) {
            return Self::Ignored { template: true };
        }

        match extension {
            "html" => Self::Html,
            "md" | "markdown" => Self::Markdown,
            "redirect" => Self::Redirect,
            _ => Self::Plain,
        }
    }

    /// Whether files of this kind never produce output.
    pub fn is_ignored(self) -> bool {
        matches!(self, Self::Ignored { .. })
    }
}

/// One file discovered under a content root.
///
/// Everything except the reference set is fixed at construction. References
/// are filled in by the load pass after a reload and refreshed by each render.
#[derive(Debug)]
pub struct File {
    path: PathBuf,
    content_relative_path: String,
    extension: String,
    name_without_extension: String,
    root_parts: Vec<String>,
    kind: FileKind,
    output_relative_path: Option<String>,
    references: RwLock<BTreeSet<String>>,
}

impl File {
    /// Create a file entry for `path`, found under content root `root`.
    pub fn new(root: &Path, path: PathBuf) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let content_relative_path = segments.join("/");

        let file_name = segments.last().map_or("", String::as_str);
        let (name_without_extension, extension) = match Path::new(file_name).extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy().into_owned();
                let stem = file_name[..file_name.len() - ext.len() - 1].to_owned();
                (stem, ext)
            }
            None => (file_name.to_owned(), String::new()),
        };

        let mut root_parts = segments[..segments.len().saturating_sub(1)].to_vec();
        root_parts.push(name_without_extension.clone());

        let kind = FileKind::for_name(file_name);
        let output_relative_path = output_path_for(
            kind,
            &root_parts[..root_parts.len() - 1],
            &name_without_extension,
            &extension,
            &content_relative_path,
        );

        Self {
            path,
            content_relative_path,
            extension,
            name_without_extension,
            root_parts,
            kind,
            output_relative_path,
            references: RwLock::new(BTreeSet::new()),
        }
    }

    /// Absolute source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the owning content root, `/`-separated.
    ///
    /// This is also the file's template name.
    pub fn content_relative_path(&self) -> &str {
        &self.content_relative_path
    }

    /// Last extension without the dot, empty if there is none.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn name_without_extension(&self) -> &str {
        &self.name_without_extension
    }

    /// Directory segments followed by the name without extension.
    pub fn root_parts(&self) -> &[String] {
        &self.root_parts
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Output path relative to the output directory, `None` for ignored files.
    pub fn output_relative_path(&self) -> Option<&str> {
        self.output_relative_path.as_deref()
    }

    /// Root-relative URL of the rendered page.
    ///
    /// A trailing `index.html` is dropped, so `about/index.html` is served as `/about/`.
    pub fn url(&self) -> Option<String> {
        let output = self.output_relative_path.as_deref()?;
        let url = format!("/{output}");
        Some(match url.strip_suffix("index.html") {
            Some(dir) if dir.ends_with('/') => dir.to_owned(),
            _ => url,
        })
    }

    /// Templates this file depends on, directly or transitively.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn references(&self) -> BTreeSet<String> {
        self.references.read().unwrap().clone()
    }

    /// Replace the reference set.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_references(&self, references: BTreeSet<String>) {
        *self.references.write().unwrap() = references;
    }

    /// Whether a change to `content_relative_path` requires re-rendering this file.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn is_affected_by(&self, content_relative_path: &str) -> bool {
        self.content_relative_path == content_relative_path
            || self
                .references
                .read()
                .unwrap()
                .contains(content_relative_path)
    }
}

fn output_path_for(
    kind: FileKind,
    dir: &[String],
    name_without_extension: &str,
    extension: &str,
    content_relative_path: &str,
) -> Option<String> {
    match kind {
        FileKind::Ignored { .. } => None,
        FileKind::Plain if extension == KEEP_MARKER => Some(join(dir, name_without_extension)),
        FileKind::Plain => Some(content_relative_path.to_owned()),
        FileKind::Html | FileKind::Markdown | FileKind::Redirect => {
            Some(pretty_path(dir, name_without_extension))
        }
    }
}

/// `<dir>/<name>/index.html`, except for `index` and `*.keep` pages.
fn pretty_path(dir: &[String], name: &str) -> String {
    if let Some(kept) = name
        .strip_suffix(KEEP_MARKER)
        .and_then(|n| n.strip_suffix('.'))
    {
        return join(dir, &format!("{kept}.html"));
    }

    if name == "index" {
        return join(dir, "index.html");
    }

    let mut parts = dir.to_vec();
    parts.push(name.to_owned());
    join(&parts, "index.html")
}

fn join(dir: &[String], leaf: &str) -> String {
    if dir.is_empty() {
        leaf.to_owned()
    } else {
        format!("{}/{leaf}", dir.join("/"))
    }
}
