//! Wire-format tests for autotest-core types.

use autotest_core::*;
use pretty_assertions::assert_eq;

#[test]
fn test_parse_container_report() {
    let json = r###"{
        "feedback": "## Results\n\n3 of 4 tests passed.",
        "result": "SUCCESS",
        "scoreOverall": 75.0,
        "scoreTest": 75.0,
        "scoreCover": null,
        "passNames": ["a", "b", "c"],
        "failNames": ["d"],
        "errorNames": [],
        "skipNames": [],
        "custom": {}
    }"###;

    let report: GradeReport = serde_json::from_str(json).expect("deserialize");
    assert_eq!(report.score_overall, 75.0);
    assert_eq!(report.score_cover, None);
    assert_eq!(report.pass_names.len(), 3);
    assert_eq!(report.fail_names, vec!["d".to_string()]);
    assert!(report.feedback.starts_with("## Results"));
}

#[test]
fn test_report_missing_optional_fields() {
    let report: GradeReport =
        serde_json::from_str(r#"{"scoreOverall": 0}"#).expect("deserialize");
    assert!(report.feedback.is_empty());
    assert!(report.pass_names.is_empty());
}

#[test]
fn test_report_requires_overall_score() {
    let parsed = serde_json::from_str::<GradeReport>(r#"{"feedback": "hi"}"#);
    assert!(parsed.is_err());
}

#[test]
fn test_commit_target_defaults() {
    let json = r#"{
        "repo_id": "repo1",
        "clone_url": "https://github.com/org/repo1.git",
        "commit_sha": "abcdef123456",
        "commit_url": "https://github.com/org/repo1/commit/abcdef123456",
        "postback_url": "https://api.github.com/repos/org/repo1/commits/abcdef123456/comments",
        "timestamp": "2024-03-01T12:00:00Z"
    }"#;

    let target: CommitTarget = serde_json::from_str(json).expect("deserialize");
    assert_eq!(target.deliv_id, None);
    assert!(target.flags.is_empty());
    assert!(!target.admin_request);
    assert!(!target.bot_mentioned);
}

#[test]
fn test_report_schema_names_camel_case_fields() {
    let schema = schemars::schema_for!(GradeReport);
    let json = serde_json::to_string(&schema).expect("serialize");
    assert!(json.contains("scoreOverall"));
    assert!(json.contains("passNames"));
}
