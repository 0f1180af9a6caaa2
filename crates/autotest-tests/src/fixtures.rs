//! Sample events and course configuration.

use autotest_core::{CommitTarget, ContainerConfig, JobDescriptor};
use autotest_store::CourseConfig;
use chrono::{Duration, Utc};

pub const ORG: &str = "cs310";
pub const BOT: &str = "autobot";
pub const DELIV: &str = "d1";
pub const STAFF: &str = "ta";
pub const ADMIN: &str = "prof";

/// Factory for push and comment events.
pub struct TargetFixture;

impl TargetFixture {
    pub fn commit_url(repo: &str, sha: &str) -> String {
        format!("https://github.com/{}/{}/commit/{}", ORG, repo, sha)
    }

    /// A push with no deliverable named; the course default applies.
    pub fn push(repo: &str, sha: &str) -> CommitTarget {
        CommitTarget {
            deliv_id: None,
            repo_id: repo.to_string(),
            org_id: Some(ORG.to_string()),
            person_id: None,
            bot_mentioned: false,
            clone_url: format!("https://github.com/{}/{}.git", ORG, repo),
            commit_sha: sha.to_string(),
            commit_url: Self::commit_url(repo, sha),
            postback_url: format!(
                "https://api.github.com/repos/{}/{}/commits/{}/comments",
                ORG, repo, sha
            ),
            timestamp: Utc::now(),
            ref_name: "refs/heads/main".to_string(),
            flags: Vec::new(),
            admin_request: false,
        }
    }

    /// `@autobot #d1` from `person`.
    pub fn comment(person: &str, repo: &str, sha: &str) -> CommitTarget {
        CommitTarget {
            deliv_id: Some(DELIV.to_string()),
            person_id: Some(person.to_string()),
            bot_mentioned: true,
            ref_name: String::new(),
            ..Self::push(repo, sha)
        }
    }

    pub fn job(repo: &str, sha: &str, container: ContainerConfig) -> JobDescriptor {
        JobDescriptor::new(DELIV, Self::push(repo, sha), container)
    }
}

/// Factory for deliverable and course settings.
pub struct ConfigFixture;

impl ConfigFixture {
    /// Open since yesterday, closing in a week.
    pub fn container(student_delay: i64) -> ContainerConfig {
        let now = Utc::now();
        ContainerConfig {
            image: "grader:d1".to_string(),
            max_exec_time: 300,
            student_delay,
            open_timestamp: now - Duration::days(1),
            close_timestamp: now + Duration::days(7),
            late_autotest: false,
            regression_deliv_ids: Vec::new(),
            cpus: None,
            memory_bytes: None,
            network: None,
            custom: serde_json::Value::Null,
        }
    }

    pub fn with_timeout(max_exec_time: i64) -> ContainerConfig {
        ContainerConfig {
            max_exec_time,
            ..Self::container(0)
        }
    }

    /// One deliverable, `d1`, as the default, with one TA and one admin.
    pub fn course(student_delay: i64) -> CourseConfig {
        let mut course = CourseConfig {
            default_deliverable: Some(DELIV.to_string()),
            staff: vec![STAFF.to_string()],
            admins: vec![ADMIN.to_string()],
            ..Default::default()
        };
        course
            .deliverables
            .insert(DELIV.to_string(), Self::container(student_delay));
        course
    }

    /// `d1` also re-runs the `d0` grader.
    pub fn course_with_regression() -> CourseConfig {
        let mut course = Self::course(0);
        if let Some(d1) = course.deliverables.get_mut(DELIV) {
            d1.regression_deliv_ids = vec!["d0".to_string()];
        }
        course.deliverables.insert(
            "d0".to_string(),
            ContainerConfig {
                image: "grader:d0".to_string(),
                ..Self::container(0)
            },
        );
        course
    }
}
