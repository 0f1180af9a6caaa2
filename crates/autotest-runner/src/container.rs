//! Docker container runtime.

use async_trait::async_trait;
use autotest_core::ports::{ContainerHandle, ContainerRuntime, ContainerSpec};
use autotest_core::{Error, Result};
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use futures::StreamExt;
use tracing::{debug, info};

/// `ContainerRuntime` backed by the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Container(format!("Failed to connect to Docker: {}", e)))?;
        Ok(Self { docker })
    }

    /// Create with an existing Docker client.
    pub fn with_docker(docker: Docker) -> Self {
        Self { docker }
    }
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    Config {
        image: Some(spec.image.clone()),
        user: spec.user.clone(),
        env: Some(spec.env.clone()),
        host_config: Some(HostConfig {
            binds: Some(spec.binds.clone()),
            extra_hosts: (!spec.extra_hosts.is_empty()).then(|| spec.extra_hosts.clone()),
            network_mode: spec.network.clone(),
            nano_cpus: spec.nano_cpus,
            memory: spec.memory_bytes,
            auto_remove: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };
        let response = self
            .docker
            .create_container(Some(options), container_config(spec))
            .await
            .map_err(|e| Error::Container(format!("Failed to create container: {}", e)))?;

        info!(
            container = %spec.name,
            id = %response.id,
            image = %spec.image,
            "Container created"
        );
        Ok(ContainerHandle { id: response.id })
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<()> {
        self.docker
            .start_container(&handle.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Container(format!("Failed to start container: {}", e)))
    }

    async fn stop(&self, handle: &ContainerHandle, grace_secs: i64) -> Result<()> {
        self.docker
            .stop_container(&handle.id, Some(StopContainerOptions { t: grace_secs }))
            .await
            .map_err(|e| Error::Container(format!("Failed to stop container: {}", e)))
    }

    async fn wait(&self, handle: &ContainerHandle) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(&handle.id, Some(options));
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(Error::Container(format!("Container wait failed: {}", e))),
            None => Err(Error::Container(
                "Container wait returned no result".to_string(),
            )),
        }
    }

    async fn logs(&self, handle: &ContainerHandle) -> Result<String> {
        let options = LogsOptions::<String> {
            follow: false,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(&handle.id, Some(options));
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message })
                | Ok(LogOutput::StdErr { message })
                | Ok(LogOutput::Console { message }) => {
                    out.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::Container(format!(
                        "Error reading container logs: {}",
                        e
                    )));
                }
            }
        }
        debug!(id = %handle.id, bytes = out.len(), "Container logs collected");
        Ok(out)
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(&handle.id, Some(options))
            .await
            .map_err(|e| Error::Container(format!("Failed to remove container: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_config_applies_limits() {
        let spec = ContainerSpec {
            name: "autotest-abc-d1".to_string(),
            image: "grader:d1".to_string(),
            env: vec!["ASSIGNMENT=d1".to_string()],
            binds: vec!["/runs/abc-d1:/output".to_string()],
            network: Some("grading_net".to_string()),
            extra_hosts: Vec::new(),
            user: Some("1000".to_string()),
            nano_cpus: Some(1_000_000_000),
            memory_bytes: None,
        };
        let config = container_config(&spec);
        let host = config.host_config.unwrap();

        assert_eq!(config.user.as_deref(), Some("1000"));
        assert_eq!(host.nano_cpus, Some(1_000_000_000));
        assert_eq!(host.network_mode.as_deref(), Some("grading_net"));
        assert!(host.extra_hosts.is_none());
        assert_eq!(host.binds.unwrap().len(), 1);
    }
}
