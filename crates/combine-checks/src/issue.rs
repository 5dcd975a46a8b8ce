//! Check findings.

use serde::Serialize;

const DOCS_URL: &str = "https://combine.dropseed.io/checks/";

/// A single finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Stable kebab-case identifier, e.g. `title-missing`.
    #[serde(rename = "type")]
    pub issue_type: String,
    #[serde(skip)]
    pub description: String,
    /// Details such as the offending element, in insertion order.
    pub context: Vec<(String, String)>,
}

impl Issue {
    pub fn new(issue_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            issue_type: issue_type.into(),
            description: description.into(),
            context: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.push((key.to_owned(), value.into()));
        self
    }

    /// Documentation link for this issue type.
    pub fn docs_url(&self) -> String {
        format!("{DOCS_URL}#{}", self.issue_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_docs_url() {
        let issue = Issue::new("title-missing", "The title tag is missing.");
        assert_eq!(
            issue.docs_url(),
            "https://combine.dropseed.io/checks/#title-missing"
        );
    }

    #[test]
    fn test_serialize() {
        let issue = Issue::new("duplicate-id", "desc").with_context("id", "main");
        assert_eq!(
            serde_json::to_value(&issue).unwrap(),
            serde_json::json!({"type": "duplicate-id", "context": [["id", "main"]]})
        );
    }
}
