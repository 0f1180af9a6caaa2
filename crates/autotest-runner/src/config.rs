//! Executor configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where jobs run and how their containers are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Workspaces live under `<persist_dir>/runs/`.
    pub persist_dir: PathBuf,
    /// `persist_dir` as seen by the Docker daemon; differs when AutoTest itself
    /// runs in a container.
    #[serde(default)]
    pub host_dir: Option<PathBuf>,
    /// Grading user; workspaces are chowned to it and containers run as it.
    #[serde(default = "default_docker_uid")]
    pub docker_uid: u32,
    /// Token injected into clone URLs.
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default = "default_network")]
    pub network: Option<String>,
    #[serde(default)]
    pub extra_hosts: Vec<String>,
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: i64,
    #[serde(default = "default_cpus")]
    pub default_cpus: f64,
}

fn default_docker_uid() -> u32 {
    1000
}

fn default_network() -> Option<String> {
    Some("grading_net".to_string())
}

fn default_stop_grace_secs() -> i64 {
    10
}

fn default_cpus() -> f64 {
    1.0
}

impl RunnerConfig {
    pub fn new(persist_dir: impl Into<PathBuf>) -> Self {
        Self {
            persist_dir: persist_dir.into(),
            host_dir: None,
            docker_uid: default_docker_uid(),
            bot_token: None,
            network: default_network(),
            extra_hosts: Vec::new(),
            stop_grace_secs: default_stop_grace_secs(),
            default_cpus: default_cpus(),
        }
    }

    pub fn with_host_dir(mut self, host_dir: impl Into<PathBuf>) -> Self {
        self.host_dir = Some(host_dir.into());
        self
    }

    pub fn with_bot_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = Some(token.into());
        self
    }

    pub fn with_docker_uid(mut self, uid: u32) -> Self {
        self.docker_uid = uid;
        self
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        self.network = network;
        self
    }

    pub fn host_dir(&self) -> &PathBuf {
        self.host_dir.as_ref().unwrap_or(&self.persist_dir)
    }
}
