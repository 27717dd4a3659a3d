//! Per-resource findings from a static infrastructure scan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFindings {
    #[serde(default)]
    pub has_issues: bool,
    #[serde(default)]
    pub failed_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceErrors(pub BTreeMap<String, ResourceFindings>);

impl ResourceErrors {
    pub fn has_issues(&self, resource_id: &str) -> bool {
        self.0.get(resource_id).is_some_and(|found| found.has_issues)
    }

    pub fn failed_count(&self, resource_id: &str) -> u32 {
        self.0.get(resource_id).map_or(0, |found| found.failed_count)
    }

    pub fn indicator_text(&self, resource_id: &str) -> String {
        match self.failed_count(resource_id) {
            0 => String::new(),
            1 => "1 issue".to_string(),
            count => format!("{count} issues"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn indicator_color(failed_count: u32) -> &'static str {
    match failed_count {
        0 => "transparent",
        1..=3 => "#F56565",
        4..=10 => "#ED8936",
        _ => "#E53E3E",
    }
}

/// Conventional location of a graph's findings next to its manifest.
pub fn default_scan_path(base_dir: &Path, graph_name: &str) -> PathBuf {
    base_dir
        .join("checkov")
        .join(graph_name)
        .join("checkov_resource_errors.json")
}

/// Reads findings, degrading to an empty set when the file is missing or malformed.
pub fn load_resource_errors(path: &Path) -> ResourceErrors {
    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|raw| serde_json::from_str::<ResourceErrors>(&raw).map_err(anyhow::Error::from));
    match parsed {
        Ok(errors) => errors,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to load scan findings");
            ResourceErrors::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceErrors {
        serde_json::from_str(
            r#"{
                "aws_s3_bucket.logs": {"has_issues": true, "failed_count": 1},
                "aws_iam_role.admin": {"has_issues": true, "failed_count": 12},
                "aws_vpc.main": {"has_issues": false, "failed_count": 0}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn reports_findings_per_resource() {
        let errors = sample();
        assert!(errors.has_issues("aws_s3_bucket.logs"));
        assert!(!errors.has_issues("aws_vpc.main"));
        assert!(!errors.has_issues("missing"));
        assert_eq!(errors.failed_count("aws_iam_role.admin"), 12);
        assert_eq!(errors.failed_count("missing"), 0);
    }

    #[test]
    fn indicator_text_pluralizes() {
        let errors = sample();
        assert_eq!(errors.indicator_text("aws_vpc.main"), "");
        assert_eq!(errors.indicator_text("aws_s3_bucket.logs"), "1 issue");
        assert_eq!(errors.indicator_text("aws_iam_role.admin"), "12 issues");
    }

    #[test]
    fn indicator_color_by_severity() {
        assert_eq!(indicator_color(0), "transparent");
        assert_eq!(indicator_color(3), "#F56565");
        assert_eq!(indicator_color(4), "#ED8936");
        assert_eq!(indicator_color(10), "#ED8936");
        assert_eq!(indicator_color(11), "#E53E3E");
    }

    #[test]
    fn missing_file_yields_no_findings() {
        let errors = load_resource_errors(Path::new("/nonexistent/checkov.json"));
        assert!(errors.is_empty());
        assert_eq!(
            default_scan_path(Path::new("graphs"), "demo"),
            Path::new("graphs/checkov/demo/checkov_resource_errors.json")
        );
    }
}
