use autotest_core::{CommitTarget, ContainerConfig, JobDescriptor};
use chrono::{Duration, Utc};

pub(crate) fn job(commit_url: &str, deliv_id: &str) -> JobDescriptor {
    let now = Utc::now();
    let target = CommitTarget {
        deliv_id: Some(deliv_id.to_string()),
        repo_id: "repo".to_string(),
        org_id: None,
        person_id: None,
        bot_mentioned: false,
        clone_url: "https://github.com/org/repo.git".to_string(),
        commit_sha: format!("{}sha", commit_url),
        commit_url: commit_url.to_string(),
        postback_url: format!("{}/comments", commit_url),
        timestamp: now,
        ref_name: String::new(),
        flags: Vec::new(),
        admin_request: false,
    };
    let container = ContainerConfig {
        image: "grader:latest".to_string(),
        max_exec_time: 300,
        student_delay: 3600,
        open_timestamp: now - Duration::days(1),
        close_timestamp: now + Duration::days(1),
        late_autotest: false,
        regression_deliv_ids: Vec::new(),
        cpus: None,
        memory_bytes: None,
        network: None,
        custom: serde_json::Value::Null,
    };
    JobDescriptor::new(deliv_id, target, container)
}

pub(crate) fn admin_job(commit_url: &str, deliv_id: &str) -> JobDescriptor {
    let mut job = job(commit_url, deliv_id);
    job.target.admin_request = true;
    job
}
