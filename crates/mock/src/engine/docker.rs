//! [`ContainerRuntime`] backed by the local Docker daemon.

use super::{ContainerRuntime, ContainerSpec, LogChunk, LogStream};
use crate::error::{MockError, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use futures::StreamExt as _;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

const LOG_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform's default socket.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Engine`] if no Docker endpoint can be configured.
    pub fn connect() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| MockError::engine("connect", e))?;
        Ok(Self { docker })
    }

    #[must_use]
    pub fn with_client(docker: Docker) -> Self {
        Self { docker }
    }
}

fn is_not_found(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(MockError::engine("inspect image", e)),
        }
    }

    async fn pull_image(&self, repository: &str, tag: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: repository,
            tag,
            ..Default::default()
        };
        let mut progress = Box::pin(self.docker.create_image(Some(options), None, None));
        while let Some(update) = progress.next().await {
            let info = update.map_err(|e| MockError::engine("pull image", e))?;
            if let Some(status) = info.status {
                tracing::trace!(image = %repository, %status, "pull");
            }
        }
        tracing::debug!(image = %repository, %tag, "image pulled");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let container_port = format!("{}/tcp", spec.container_port);
        let port_bindings = HashMap::from([(
            container_port.clone(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        )]);

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            cmd: Some(spec.cmd.clone()),
            labels: Some(spec.labels.clone().into_iter().collect()),
            exposed_ports: Some(HashMap::from([(container_port, HashMap::new())])),
            host_config: Some(HostConfig {
                binds: Some(vec![format!(
                    "{}:{}",
                    spec.bind_source.display(),
                    spec.bind_target
                )]),
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| MockError::engine("create container", e))?;
        for warning in &created.warnings {
            tracing::warn!(container = %created.id, "{warning}");
        }
        Ok(created.id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| MockError::engine("start container", e))
    }

    async fn stop_container(&self, id: &str, timeout: Duration) -> Result<()> {
        let options = StopContainerOptions {
            t: i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX),
        };
        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped.
            Err(DockerError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(MockError::engine("stop container", e)),
        }
    }

    async fn is_running(&self, id: &str) -> Result<bool> {
        match self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => Ok(details
                .state
                .and_then(|state| state.running)
                .unwrap_or(false)),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(MockError::engine("inspect container", e)),
        }
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(MockError::engine("remove container", e)),
        }
    }

    fn logs(&self, id: &str) -> LogStream {
        let (tx, rx) = mpsc::channel(LOG_BUFFER);
        let docker = self.docker.clone();
        let id = id.to_string();

        tokio::spawn(async move {
            let options = LogsOptions::<String> {
                follow: true,
                stdout: true,
                stderr: true,
                ..Default::default()
            };
            let mut output = Box::pin(docker.logs(&id, Some(options)));
            while let Some(item) = output.next().await {
                let chunk = match item {
                    Ok(LogOutput::StdErr { message }) => Ok(LogChunk::Stderr(message)),
                    Ok(
                        LogOutput::StdOut { message }
                        | LogOutput::Console { message }
                        | LogOutput::StdIn { message },
                    ) => Ok(LogChunk::Stdout(message)),
                    Err(e) => Err(MockError::engine("stream logs", e)),
                };
                let failed = chunk.is_err();
                if tx.send(chunk).await.is_err() || failed {
                    break;
                }
            }
        });

        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        }))
    }
}
