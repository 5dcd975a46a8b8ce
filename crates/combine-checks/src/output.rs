//! Checks on output files regardless of content type, and on the output
//! directory as a whole.

use std::fs;
use std::path::Path;

use crate::issue::Issue;

/// Extensions with a size limit, in bytes.
const MAX_FILE_SIZES: &[(&str, u64)] = &[
    ("png", 10_000_000),
    ("jpg", 10_000_000),
    ("jpeg", 10_000_000),
];

/// Flag images too large to serve comfortably.
pub fn file_size(output_path: &Path, output_dir: &Path) -> Option<Issue> {
    let ext = output_path.extension()?.to_str()?;
    let (_, max) = MAX_FILE_SIZES.iter().find(|(e, _)| *e == ext)?;
    let size = fs::metadata(output_path).ok()?.len();

    (size > *max).then(|| {
        let shown = output_path.strip_prefix(output_dir).unwrap_or(output_path);
        Issue::new(
            "file-size-too-large",
            format!("Files of type .{ext} shouldn't be bigger than {}", format_size(*max)),
        )
        .with_context("output_path", shown.display().to_string())
        .with_context("file_size", format_size(size))
    })
}

/// Flag a site without `/favicon.ico`.
pub fn favicon(output_dir: &Path) -> Option<Issue> {
    (!output_dir.join("favicon.ico").exists()).then(|| {
        Issue::new(
            "favicon-missing",
            "Your site should have a Favicon at /favicon.ico.",
        )
    })
}

/// Flag a build that wrote nothing.
pub fn empty_build(output_dir: &Path) -> Option<Issue> {
    let empty = !fs::read_dir(output_dir).is_ok_and(|mut entries| entries.next().is_some());
    empty.then(|| Issue::new("empty-build", "The build produced no output files."))
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in [" bytes", "KB", "MB", "GB"] {
        if size < 1000.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1000.0;
    }
    format!("{size:.1}TB")
}
