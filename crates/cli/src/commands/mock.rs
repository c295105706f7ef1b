use crate::config::CliConfig;
use anyhow::Context as _;
use clap::Args;
use opendeps_fetch::ContentFetcher;
use opendeps_manifest::discovery::find_manifest;
use opendeps_mock::engine::DockerRuntime;
use opendeps_mock::{ContainerRuntime, EngineOptions, MockRequest, PullPolicy, StagingPolicy};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct MockArgs {
    /// Manifest file, or a directory containing `opendeps.yaml` [default: current directory]
    pub manifest: Option<PathBuf>,

    /// Host port the mock engine listens on
    #[arg(short, long, env = "OPENDEPS_PORT")]
    pub port: Option<u16>,

    /// Mock engine image
    #[arg(long, env = "OPENDEPS_ENGINE_IMAGE")]
    pub image: Option<String>,

    /// Mock engine image tag
    #[arg(long, env = "OPENDEPS_ENGINE_TAG")]
    pub tag: Option<String>,

    /// When to pull the image: if-not-present or always
    #[arg(long, env = "OPENDEPS_PULL_POLICY")]
    pub pull_policy: Option<PullPolicy>,

    /// Log level passed to the mock engine
    #[arg(long, env = "OPENDEPS_ENGINE_LOG_LEVEL")]
    pub engine_log_level: Option<String>,

    /// Seconds to wait for the container to stop on shutdown
    #[arg(long, env = "OPENDEPS_STOP_TIMEOUT_SECS")]
    pub stop_timeout_secs: Option<u64>,

    /// Overwrite files in the staging directory instead of choosing a new name
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Stage specs and generate configuration without starting the engine
    #[arg(long)]
    pub dry_run: bool,
}

impl MockArgs {
    /// Flags (and their environment variables) override the config file, which overrides the
    /// defaults.
    pub fn engine_options(&self, config: &CliConfig) -> EngineOptions {
        let defaults = EngineOptions::default();
        EngineOptions {
            image: self
                .image
                .clone()
                .or_else(|| config.engine_image.clone())
                .unwrap_or(defaults.image),
            tag: self
                .tag
                .clone()
                .or_else(|| config.engine_tag.clone())
                .unwrap_or(defaults.tag),
            port: self.port.or(config.port).unwrap_or(defaults.port),
            pull_policy: self
                .pull_policy
                .or(config.pull_policy)
                .unwrap_or(defaults.pull_policy),
            log_level: self
                .engine_log_level
                .clone()
                .or_else(|| config.engine_log_level.clone())
                .unwrap_or(defaults.log_level),
            stop_timeout: self
                .stop_timeout_secs
                .or(config.stop_timeout_secs)
                .map_or(defaults.stop_timeout, Duration::from_secs),
            ..defaults
        }
    }
}

pub async fn run(args: MockArgs, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let manifest_path = find_manifest(args.manifest.as_deref())?;
    let request = MockRequest {
        staging: StagingPolicy {
            force_overwrite: args.force_overwrite,
        },
        engine: args.engine_options(config),
        dry_run: args.dry_run,
        ..MockRequest::new(manifest_path)
    };
    tracing::debug!(
        image = %request.engine.image_ref(),
        port = request.engine.port,
        pull_policy = %request.engine.pull_policy,
        "engine options"
    );

    let signals = opendeps_mock::supervisor::os_signals().context("install signal handlers")?;
    let connect = || -> opendeps_mock::Result<Arc<dyn ContainerRuntime>> {
        Ok(Arc::new(DockerRuntime::connect()?))
    };

    let report = opendeps_mock::run_session(
        &request,
        &ContentFetcher::with_client(super::http_client()?),
        connect,
        signals,
        &mut tokio::io::stdout(),
        &mut tokio::io::stderr(),
    )
    .await
    .context("mock session failed")?;

    if let Some(signal) = report.interrupted {
        tracing::info!("{signal} received while staging, engine not started");
    } else if request.dry_run {
        tracing::info!(
            "dry run complete: {} spec(s) staged, engine not started",
            report.bundle.specs.len()
        );
    } else if report.started {
        tracing::info!("mock engine stopped");
    }
    Ok(ExitCode::SUCCESS)
}
