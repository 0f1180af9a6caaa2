//! Grading output records.

use crate::target::JobDescriptor;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const FEEDBACK_DEFAULT_FAIL: &str =
    "Unable to grade commit; please make another commit and try again.";
pub const FEEDBACK_NO_REPORT: &str = "Failed to read grade report. Make a new commit and try again.";

/// Terminal state of a grading container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    Success,
    Fail,
    Timeout,
    NoReport,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerState::Success => write!(f, "SUCCESS"),
            ContainerState::Fail => write!(f, "FAIL"),
            ContainerState::Timeout => write!(f, "TIMEOUT"),
            ContainerState::NoReport => write!(f, "NO_REPORT"),
        }
    }
}

/// The report a grading container writes to `report.json`.
///
/// Field names are camelCase on disk; containers are built against that contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    /// Markdown returned to the student.
    #[serde(default)]
    pub feedback: String,
    /// Grading status inside the container, e.g. `SUCCESS`, `FAIL_COMPILE`, `FAIL_LINT`.
    #[serde(default)]
    pub result: String,
    pub score_overall: f64,
    #[serde(default)]
    pub score_test: Option<f64>,
    #[serde(default)]
    pub score_cover: Option<f64>,
    #[serde(default)]
    pub pass_names: Vec<String>,
    #[serde(default)]
    pub fail_names: Vec<String>,
    #[serde(default)]
    pub error_names: Vec<String>,
    #[serde(default)]
    pub skip_names: Vec<String>,
    #[serde(default)]
    pub custom: serde_json::Value,
}

impl GradeReport {
    /// A zero-score report carrying only a feedback message.
    pub fn with_feedback(feedback: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            feedback: feedback.into(),
            result: result.into(),
            score_overall: 0.0,
            score_test: None,
            score_cover: None,
            pass_names: Vec::new(),
            fail_names: Vec::new(),
            error_names: Vec::new(),
            skip_names: Vec::new(),
            custom: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerOutput {
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    pub report: GradeReport,
    /// Always show this result, without charging quota.
    pub postback_on_complete: bool,
    pub state: ContainerState,
    pub grader_task_id: String,
    #[serde(default)]
    pub custom: serde_json::Value,
}

impl ContainerOutput {
    /// The output a job starts with; anything that aborts the job early leaves it like this.
    /// Always posted, never charged.
    pub fn default_fail(grader_task_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            report: GradeReport::with_feedback(FEEDBACK_DEFAULT_FAIL, "FAIL"),
            postback_on_complete: true,
            state: ContainerState::Fail,
            grader_task_id: grader_task_id.into(),
            custom: serde_json::Value::Null,
        }
    }
}

/// One finished grading job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub deliv_id: String,
    pub repo_id: String,
    pub commit_sha: String,
    pub commit_url: String,
    pub input: JobDescriptor,
    pub output: ContainerOutput,
}

impl ExecutionResult {
    pub fn new(input: JobDescriptor, output: ContainerOutput) -> Self {
        Self {
            deliv_id: input.deliv_id.clone(),
            repo_id: input.target.repo_id.clone(),
            commit_sha: input.target.commit_sha.clone(),
            commit_url: input.target.commit_url.clone(),
            input,
            output,
        }
    }

    /// Markdown posted back for this result.
    pub fn feedback(&self) -> &str {
        &self.output.report.feedback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fail_posts_back() {
        let out = ContainerOutput::default_fail("abc-d1");
        assert_eq!(out.state, ContainerState::Fail);
        assert!(out.postback_on_complete);
        assert_eq!(out.report.feedback, FEEDBACK_DEFAULT_FAIL);
    }

    #[test]
    fn test_state_wire_names() {
        let json = serde_json::to_string(&ContainerState::NoReport).unwrap();
        assert_eq!(json, "\"NO_REPORT\"");
        assert_eq!(ContainerState::Timeout.to_string(), "TIMEOUT");
    }
}
