//! Service configuration.

use anyhow::Context;
use autotest_engine::GitHubConfig;
use autotest_runner::RunnerConfig;
use autotest_scheduler::SchedulerConfig;
use autotest_store::CourseConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// AutoTest service configuration, loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTestConfig {
    /// GitHub account the grader posts as.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Course org; events from other orgs are refused.
    #[serde(default)]
    pub org: Option<String>,
    /// Workspaces and queue snapshots.
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
    /// `persist_dir` as seen by the Docker daemon.
    #[serde(default)]
    pub host_dir: Option<PathBuf>,
    #[serde(default = "default_docker_uid")]
    pub docker_uid: u32,
    #[serde(default)]
    pub github_token: Option<String>,
    /// Send comments to GitHub; when false they are only logged.
    #[serde(default = "default_postback")]
    pub postback: bool,
    #[serde(default)]
    pub capacities: SchedulerConfig,
    #[serde(default)]
    pub docker: DockerSettings,
    #[serde(default)]
    pub course: CourseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerSettings {
    #[serde(default = "default_grading_network")]
    pub grading_network: Option<String>,
    #[serde(default)]
    pub extra_hosts: Vec<String>,
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: i64,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            grading_network: default_grading_network(),
            extra_hosts: Vec::new(),
            stop_grace_secs: default_stop_grace_secs(),
        }
    }
}

fn default_bot_name() -> String {
    "autobot".to_string()
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("/var/lib/autotest")
}

fn default_docker_uid() -> u32 {
    1000
}

fn default_postback() -> bool {
    true
}

fn default_grading_network() -> Option<String> {
    Some("grading_net".to_string())
}

fn default_stop_grace_secs() -> i64 {
    10
}

impl AutoTestConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn runner_config(&self) -> RunnerConfig {
        let mut runner = RunnerConfig::new(&self.persist_dir)
            .with_docker_uid(self.docker_uid)
            .with_network(self.docker.grading_network.clone());
        if let Some(host_dir) = &self.host_dir {
            runner = runner.with_host_dir(host_dir);
        }
        if let Some(token) = &self.github_token {
            runner = runner.with_bot_token(token);
        }
        runner.extra_hosts = self.docker.extra_hosts.clone();
        runner.stop_grace_secs = self.docker.stop_grace_secs;
        runner
    }

    pub fn github_config(&self) -> GitHubConfig {
        GitHubConfig {
            bot_name: self.bot_name.clone(),
            org: self.org.clone(),
        }
    }

    /// Copy safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.github_token.is_some() {
            config.github_token = Some("********".to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let config: AutoTestConfig = serde_yaml::from_str("org: cs310\n").unwrap();
        assert_eq!(config.bot_name, "autobot");
        assert_eq!(config.org.as_deref(), Some("cs310"));
        assert_eq!(config.capacities, SchedulerConfig::default());
        assert_eq!(config.docker.grading_network.as_deref(), Some("grading_net"));
        assert!(config.postback);
        assert!(config.course.deliverables.is_empty());
    }

    #[test]
    fn test_from_file_and_runner_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
bot_name: grader
persist_dir: /tmp/autotest
host_dir: /srv/autotest
docker_uid: 1500
github_token: abc
capacities:
  express: 4
docker:
  grading_network: null
  extra_hosts: ["portal:10.0.0.2"]
course:
  default_deliverable: d1
"#
        )
        .unwrap();

        let config = AutoTestConfig::from_file(file.path()).unwrap();
        assert_eq!(config.capacities.express, 4);
        assert_eq!(config.capacities.standard, 2);

        let runner = config.runner_config();
        assert_eq!(runner.docker_uid, 1500);
        assert_eq!(runner.network, None);
        assert_eq!(runner.host_dir(), &PathBuf::from("/srv/autotest"));
        assert_eq!(runner.extra_hosts, vec!["portal:10.0.0.2".to_string()]);
        assert_eq!(runner.bot_token.as_deref(), Some("abc"));

        assert_eq!(config.redacted().github_token.as_deref(), Some("********"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = AutoTestConfig::from_file(Path::new("/nonexistent/autotest.yml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/autotest.yml"));
    }
}
