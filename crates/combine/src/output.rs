//! Colored terminal output utilities.

use combine_checks::{CheckReport, Issue};
use combine_site::BuildReport;
use console::{Style, Term};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    green: Style,
    yellow: Style,
    yellow_bold: Style,
    red: Style,
    bold: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            yellow_bold: Style::new().yellow().bold(),
            red: Style::new().red(),
            bold: Style::new().bold(),
        }
    }

    /// Print a progress step (`❯ ...`, bold).
    pub(crate) fn step(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&self.bold.apply_to(format!("❯ {msg}")).to_string());
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print a highlighted banner (green, bold).
    pub(crate) fn banner(&self, msg: &str) {
        let _ = self
            .term
            .write_line(&self.green.clone().bold().apply_to(msg).to_string());
    }

    /// Print every file that failed to render.
    pub(crate) fn render_errors(&self, report: &BuildReport) {
        for failure in &report.errors {
            self.error(&format!(
                "Error rendering {}: {}",
                failure.content_relative_path, failure.error
            ));
        }
    }

    /// Print check findings grouped per file, then site-wide ones.
    pub(crate) fn check_report(&self, report: &CheckReport) {
        for file in &report.files {
            self.issues(&format!("Issues in {}", file.content_relative_path), &file.issues);
        }
        if !report.site.is_empty() {
            self.issues("Site issues", &report.site);
        }
    }

    fn issues(&self, header: &str, issues: &[Issue]) {
        let _ = self.term.write_line("");
        let _ = self.term.write_line(&self.yellow.apply_to(header).to_string());
        for (index, issue) in issues.iter().enumerate() {
            let title = format!("\n  {}. {}", index + 1, issue.description);
            let _ = self.term.write_line(&self.yellow_bold.apply_to(title).to_string());
            let _ = self
                .term
                .write_line(&self.yellow.apply_to(format!("     {}", issue.docs_url())).to_string());
            for (key, value) in &issue.context {
                let _ = self
                    .term
                    .write_line(&self.yellow.apply_to(format!("     {key}: {value}")).to_string());
            }
        }
        let _ = self.term.write_line("");
    }
}
