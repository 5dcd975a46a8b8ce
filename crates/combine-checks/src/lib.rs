//! Output checks for Combine builds.
//!
//! Checks never fail a build on their own: they read the output directory
//! and return [`Issue`] records, leaving exit-code policy to the caller.
//!
//! - Per-file checks run on every file a build wrote. HTML outputs get the
//!   document checks (title, meta description, image alt text, duplicate ids,
//!   mixed content, broken internal links, Open Graph tags). Images get a size
//!   check.
//! - Site-wide checks look at the output directory as a whole.

mod html;
mod issue;
mod output;

use std::fs;
use std::path::Path;

use combine_site::BuildReport;
use rayon::prelude::*;

pub use issue::Issue;

/// Issues found in one output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileIssues {
    /// Content-relative path of the source file.
    pub content_relative_path: String,
    pub issues: Vec<Issue>,
}

/// All issues found after a build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckReport {
    /// Per-file issues, in build order. Files without issues are omitted.
    pub files: Vec<FileIssues>,
    /// Site-wide issues.
    pub site: Vec<Issue>,
}

impl CheckReport {
    /// Total number of issues.
    pub fn len(&self) -> usize {
        self.site.len() + self.files.iter().map(|f| f.issues.len()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check every file rendered by `report`, then the output directory.
pub fn run(report: &BuildReport, output_dir: &Path) -> CheckReport {
    let files: Vec<FileIssues> = report
        .rendered
        .par_iter()
        .map(|rendered| FileIssues {
            content_relative_path: rendered.content_relative_path.clone(),
            issues: check_file(&rendered.output_path, output_dir),
        })
        .filter(|f| !f.issues.is_empty())
        .collect();

    let site = check_site(output_dir);

    let result = CheckReport { files, site };
    tracing::info!(issues = result.len(), "Ran checks");
    result
}

/// Per-file checks for the artifact at `output_path`.
pub fn check_file(output_path: &Path, output_dir: &Path) -> Vec<Issue> {
    let mut issues: Vec<Issue> = output::file_size(output_path, output_dir).into_iter().collect();

    let is_html = output_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
    if is_html {
        match fs::read_to_string(output_path) {
            Ok(html) => issues.extend(html::check_html(&html, output_path, output_dir)),
            Err(e) => {
                tracing::warn!(path = %output_path.display(), error = %e, "Cannot read output for checks");
            }
        }
    }
    issues
}

/// Site-wide checks over `output_dir`.
pub fn check_site(output_dir: &Path) -> Vec<Issue> {
    output::favicon(output_dir)
        .into_iter()
        .chain(output::empty_build(output_dir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use combine_site::RenderedFile;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_run_groups_issues_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path();
        fs::write(output.join("index.html"), "<html><head></head><body></body></html>").unwrap();
        fs::write(output.join("robots.txt"), "User-agent: *").unwrap();

        let report = BuildReport {
            full: true,
            rendered: vec![
                RenderedFile {
                    source: "/p/content/index.html".into(),
                    content_relative_path: "index.html".to_owned(),
                    output_path: output.join("index.html"),
                },
                RenderedFile {
                    source: "/p/content/robots.txt.keep".into(),
                    content_relative_path: "robots.txt.keep".to_owned(),
                    output_path: output.join("robots.txt"),
                },
            ],
            errors: Vec::new(),
        };

        let checks = run(&report, output);
        assert_eq!(checks.files.len(), 1);
        assert_eq!(checks.files[0].content_relative_path, "index.html");
        assert_eq!(checks.files[0].issues[0].issue_type, "title-missing");
        assert_eq!(
            checks.site.iter().map(|i| i.issue_type.as_str()).collect::<Vec<_>>(),
            ["favicon-missing"]
        );
        assert_eq!(checks.len(), checks.files[0].issues.len() + 1);
    }

    #[test]
    fn test_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let checks = run(&BuildReport::default(), dir.path());
        assert!(checks.files.is_empty());
        assert_eq!(
            checks.site.iter().map(|i| i.issue_type.as_str()).collect::<Vec<_>>(),
            ["favicon-missing", "empty-build"]
        );
    }
}
