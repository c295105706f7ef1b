//! Container lifecycle for the mock engine.
//!
//! [`ContainerEngine`] drives a single container through
//! `Uninitialized -> ImagePulled -> Created -> Running -> Stopping -> Stopped` on top of a
//! [`ContainerRuntime`]. Transitions are compare-and-set on a watch channel, so shutdown can be
//! requested from the log-reading path and the signal path at the same time and only one of
//! them issues the stop.

mod docker;
#[cfg(test)]
pub(crate) mod fake;

pub use docker::DockerRuntime;

use crate::error::{MockError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_IMAGE: &str = "outofcoffee/imposter-openapi";
pub const DEFAULT_TAG: &str = "latest";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_LEVEL: &str = "DEBUG";
pub const DEFAULT_CONFIG_MOUNT: &str = "/opt/imposter/config";
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time allowed on top of the stop timeout for the runtime to report the container gone.
const STOP_GRACE: Duration = Duration::from_secs(5);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);
const MANAGED_LABEL: &str = "io.opendeps.mock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Uninitialized,
    ImagePulled,
    Created,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::ImagePulled => "image-pulled",
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullPolicy {
    /// Pull only when the image is missing locally.
    #[default]
    IfNotPresent,
    Always,
}

impl FromStr for PullPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "if-not-present" | "ifnotpresent" => Ok(Self::IfNotPresent),
            "always" => Ok(Self::Always),
            other => Err(format!(
                "unknown pull policy '{other}' (expected 'if-not-present' or 'always')"
            )),
        }
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IfNotPresent => "if-not-present",
            Self::Always => "always",
        })
    }
}

/// Engine settings, built once at the command boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub image: String,
    pub tag: String,
    /// Host port the mock listens on.
    pub port: u16,
    /// Port the engine listens on inside the container.
    pub container_port: u16,
    pub pull_policy: PullPolicy,
    /// Log level passed to the engine process.
    pub log_level: String,
    /// How long the container gets to stop before shutdown gives up waiting.
    pub stop_timeout: Duration,
    /// In-container path the staging directory is mounted at.
    pub config_mount: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            tag: DEFAULT_TAG.to_string(),
            port: DEFAULT_PORT,
            container_port: DEFAULT_PORT,
            pull_policy: PullPolicy::IfNotPresent,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            config_mount: DEFAULT_CONFIG_MOUNT.to_string(),
        }
    }
}

impl EngineOptions {
    #[must_use]
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Container definition mounting `staging_dir` at the config path and publishing one port.
    #[must_use]
    pub fn container_spec(&self, staging_dir: &Path) -> ContainerSpec {
        ContainerSpec {
            image: self.image_ref(),
            bind_source: staging_dir.to_path_buf(),
            bind_target: self.config_mount.clone(),
            host_port: self.port,
            container_port: self.container_port,
            env: vec![format!("IMPOSTER_LOG_LEVEL={}", self.log_level)],
            cmd: vec![
                format!("--configDir={}", self.config_mount),
                format!("--listenPort={}", self.container_port),
            ],
            labels: BTreeMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]),
        }
    }
}

/// What the runtime needs to create the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub bind_source: PathBuf,
    pub bind_target: String,
    pub host_port: u16,
    pub container_port: u16,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogChunk {
    Stdout(Bytes),
    Stderr(Bytes),
}

/// Container output. Ends when the container stops.
pub type LogStream = BoxStream<'static, Result<LogChunk>>;

/// The container operations the engine needs.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn image_exists(&self, image: &str) -> Result<bool>;

    async fn pull_image(&self, repository: &str, tag: &str) -> Result<()>;

    /// Returns the new container's id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    /// Ask the container to stop, allowing `timeout` before it is killed.
    async fn stop_container(&self, id: &str, timeout: Duration) -> Result<()>;

    async fn is_running(&self, id: &str) -> Result<bool>;

    /// Force-remove the container.
    async fn remove_container(&self, id: &str) -> Result<()>;

    fn logs(&self, id: &str) -> LogStream;
}

pub struct ContainerEngine {
    runtime: Arc<dyn ContainerRuntime>,
    staging_dir: PathBuf,
    options: EngineOptions,
    state: watch::Sender<EngineState>,
    history: Mutex<Vec<EngineState>>,
    container_id: Mutex<Option<String>>,
    /// Held while a start request is in flight.
    start_lock: tokio::sync::Mutex<()>,
}

impl fmt::Debug for ContainerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerEngine")
            .field("staging_dir", &self.staging_dir)
            .field("options", &self.options)
            .field("state", &self.state())
            .field("container_id", &*self.container_id.lock())
            .finish_non_exhaustive()
    }
}

impl ContainerEngine {
    #[must_use]
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        staging_dir: impl Into<PathBuf>,
        options: EngineOptions,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self {
            runtime,
            staging_dir: staging_dir.into(),
            options,
            state,
            history: Mutex::new(vec![EngineState::Uninitialized]),
            container_id: Mutex::new(None),
            start_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Every state entered so far, in order.
    #[must_use]
    pub fn history(&self) -> Vec<EngineState> {
        self.history.lock().clone()
    }

    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[must_use]
    pub fn container_id(&self) -> Option<String> {
        self.container_id.lock().clone()
    }

    /// Make the image available locally, according to the pull policy.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Engine`] if the image cannot be inspected or pulled.
    pub async fn pull(&self) -> Result<()> {
        self.expect_state("pull image", EngineState::Uninitialized)?;

        let image = self.options.image_ref();
        let present = match self.options.pull_policy {
            PullPolicy::Always => false,
            PullPolicy::IfNotPresent => self.runtime.image_exists(&image).await?,
        };
        if present {
            tracing::debug!(%image, "image present locally");
        } else {
            tracing::info!("pulling image {image}");
            self.runtime
                .pull_image(&self.options.image, &self.options.tag)
                .await?;
        }

        self.advance("pull image", EngineState::Uninitialized, EngineState::ImagePulled)
    }

    /// Create the container against the staging directory.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Engine`] if the runtime rejects the container.
    pub async fn create(&self) -> Result<()> {
        self.expect_state("create container", EngineState::ImagePulled)?;

        let spec = self.options.container_spec(&self.staging_dir);
        tracing::debug!(
            image = %spec.image,
            mount = %spec.bind_source.display(),
            port = spec.host_port,
            "creating container"
        );
        let id = self.runtime.create_container(&spec).await?;
        *self.container_id.lock() = Some(id.clone());

        let created = self.advance(
            "create container",
            EngineState::ImagePulled,
            EngineState::Created,
        );
        if let Err(e) = created {
            self.remove_created().await;
            return Err(e);
        }
        tracing::debug!(container = %short_id(&id), "container created");
        Ok(())
    }

    /// Start the created container. A container that fails to start is removed.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Engine`] if the container cannot be started.
    pub async fn start(&self) -> Result<()> {
        let _starting = self.start_lock.lock().await;
        self.expect_state("start container", EngineState::Created)?;
        let Some(id) = self.container_id() else {
            return Err(MockError::InvalidState {
                operation: "start container",
                expected: EngineState::Created,
                actual: self.state(),
            });
        };

        if let Err(e) = self.runtime.start_container(&id).await {
            self.remove_created().await;
            return Err(e);
        }
        self.advance("start container", EngineState::Created, EngineState::Running)?;
        tracing::info!(
            container = %short_id(&id),
            "mock engine listening on http://localhost:{}",
            self.options.port
        );
        Ok(())
    }

    /// Pull, create and start, stopping between steps if `shutdown` fires.
    ///
    /// Returns `false` if shutdown was requested before the container reached `Running`. A
    /// container created before that point is removed.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn bring_up(&self, shutdown: &CancellationToken) -> Result<bool> {
        if shutdown.is_cancelled() {
            return Ok(false);
        }
        self.pull().await?;
        if shutdown.is_cancelled() {
            return Ok(false);
        }
        self.create().await?;
        if shutdown.is_cancelled() {
            self.remove_created().await;
            return Ok(false);
        }
        self.start().await?;
        Ok(true)
    }

    /// Copy container output to `stdout`/`stderr` until the stream ends.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::InvalidState`] if no container was created, and
    /// [`MockError::Engine`] if the stream fails or output cannot be written.
    pub async fn copy_logs<O, E>(&self, stdout: &mut O, stderr: &mut E) -> Result<()>
    where
        O: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
    {
        let Some(id) = self.container_id() else {
            return Err(MockError::InvalidState {
                operation: "stream logs",
                expected: EngineState::Running,
                actual: self.state(),
            });
        };

        let mut logs = self.runtime.logs(&id);
        while let Some(chunk) = logs.next().await {
            match chunk? {
                LogChunk::Stdout(bytes) => {
                    stdout.write_all(&bytes).await.map_err(log_write_error)?;
                    stdout.flush().await.map_err(log_write_error)?;
                }
                LogChunk::Stderr(bytes) => {
                    stderr.write_all(&bytes).await.map_err(log_write_error)?;
                    stderr.flush().await.map_err(log_write_error)?;
                }
            }
        }
        tracing::debug!(container = %short_id(&id), "log stream ended");
        Ok(())
    }

    /// Stop the container and wait for it to exit.
    ///
    /// Safe to call any number of times from any task: the first caller to find the engine
    /// `Running` performs the stop; later callers wait for it to finish. Stop errors are logged.
    /// The engine always ends in `Stopped` once a stop has begun. A start already in flight is
    /// allowed to finish first; a container it brings up is then stopped normally.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::ShutdownTimeout`] if the container was not confirmed stopped in
    /// time.
    pub async fn shutdown(&self) -> Result<()> {
        loop {
            if self.transition(EngineState::Running, EngineState::Stopping) {
                return self.stop_claimed().await;
            }
            match self.state() {
                EngineState::Stopping => return self.wait_stopped().await,
                EngineState::Created => {
                    let _starting = self.start_lock.lock().await;
                    if self.state() == EngineState::Created {
                        self.remove_created().await;
                        return Ok(());
                    }
                }
                // A concurrent start completed between the claim attempt and the read.
                EngineState::Running => {}
                EngineState::Uninitialized | EngineState::ImagePulled | EngineState::Stopped => {
                    return Ok(());
                }
            }
        }
    }

    async fn stop_claimed(&self) -> Result<()> {
        let Some(id) = self.container_id() else {
            self.transition(EngineState::Stopping, EngineState::Stopped);
            return Ok(());
        };
        tracing::info!(container = %short_id(&id), "stopping mock engine");

        let outcome = tokio::time::timeout(self.stop_bound(), async {
            if let Err(e) = self
                .runtime
                .stop_container(&id, self.options.stop_timeout)
                .await
            {
                tracing::warn!(container = %short_id(&id), error = %e, "stop request failed");
            }
            self.wait_not_running(&id).await;
        })
        .await;

        self.transition(EngineState::Stopping, EngineState::Stopped);

        if outcome.is_err() {
            return Err(self.shutdown_timeout());
        }
        tracing::info!(container = %short_id(&id), "mock engine stopped");
        self.remove_container_logged(&id).await;
        Ok(())
    }

    /// Wait for another caller's stop to finish.
    async fn wait_stopped(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        tokio::time::timeout(
            self.stop_bound(),
            rx.wait_for(|state| *state == EngineState::Stopped),
        )
        .await
        .map_err(|_| self.shutdown_timeout())?
        .map_err(|e| MockError::engine("wait for stop", e))?;
        Ok(())
    }

    fn stop_bound(&self) -> Duration {
        self.options.stop_timeout + STOP_GRACE
    }

    fn shutdown_timeout(&self) -> MockError {
        MockError::ShutdownTimeout {
            container: self
                .container_id()
                .map(|id| short_id(&id).to_string())
                .unwrap_or_default(),
            timeout: self.options.stop_timeout,
        }
    }

    async fn wait_not_running(&self, id: &str) {
        loop {
            match self.runtime.is_running(id).await {
                Ok(false) => return,
                Ok(true) => tokio::time::sleep(STOP_POLL_INTERVAL).await,
                Err(e) => {
                    tracing::warn!(container = %short_id(id), error = %e, "cannot inspect container");
                    return;
                }
            }
        }
    }

    /// Compensating cleanup for a container that never reached `Running`.
    ///
    /// Takes the container id, so concurrent callers remove it at most once.
    async fn remove_created(&self) {
        let Some(id) = self.container_id.lock().take() else {
            return;
        };
        tracing::debug!(container = %short_id(&id), "removing container that never started");
        self.remove_container_logged(&id).await;
    }

    async fn remove_container_logged(&self, id: &str) {
        if let Err(e) = self.runtime.remove_container(id).await {
            tracing::warn!(container = %short_id(id), error = %e, "failed to remove container");
        }
    }

    fn expect_state(&self, operation: &'static str, expected: EngineState) -> Result<()> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(MockError::InvalidState {
                operation,
                expected,
                actual,
            })
        }
    }

    fn advance(&self, operation: &'static str, from: EngineState, to: EngineState) -> Result<()> {
        if self.transition(from, to) {
            Ok(())
        } else {
            Err(MockError::InvalidState {
                operation,
                expected: from,
                actual: self.state(),
            })
        }
    }

    /// Compare-and-set `from -> to`. Returns whether this call made the move.
    fn transition(&self, from: EngineState, to: EngineState) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if *state != from {
                return false;
            }
            *state = to;
            self.history.lock().push(to);
            true
        });
        if moved {
            tracing::trace!(%from, %to, "engine state");
        }
        moved
    }
}

fn log_write_error(e: std::io::Error) -> MockError {
    MockError::engine("copy logs", e)
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
