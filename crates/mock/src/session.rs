//! The end-to-end `mock` flow: stage, start, stream, stop, clean up.

use crate::bundler::{BundleReport, bundle};
use crate::engine::{ContainerEngine, ContainerRuntime, EngineOptions, EngineState};
use crate::error::Result;
use crate::staging::{StagingArea, StagingPolicy};
use crate::supervisor::SignalSupervisor;
use opendeps_fetch::ContentFetcher;
use opendeps_manifest::Manifest;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct MockRequest {
    pub manifest_path: PathBuf,
    pub staging: StagingPolicy,
    pub engine: EngineOptions,
    /// Stage and generate configuration, then stop without starting the engine.
    pub dry_run: bool,
    /// Serve the manifest endpoint through the engine's template processor.
    pub template_manifest: bool,
    /// Parent directory for the staging directory. Defaults to the system temp root.
    pub staging_root: Option<PathBuf>,
}

impl MockRequest {
    #[must_use]
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            staging: StagingPolicy::default(),
            engine: EngineOptions::default(),
            dry_run: false,
            template_manifest: true,
            staging_root: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    /// The staging directory used for the run. It no longer exists when the report is returned.
    pub staging_dir: PathBuf,
    pub bundle: BundleReport,
    /// Whether the engine reached `Running`.
    pub started: bool,
    /// Engine states entered during the run. Empty for a dry run.
    pub history: Vec<EngineState>,
    /// Signal received while staging. The engine is not touched after one arrives.
    pub interrupted: Option<&'static str>,
}

/// Run a mock session for `request`.
///
/// Stages the manifest and its specs, starts the engine against the staging directory, copies
/// its output to `stdout`/`stderr` and stops it when the output ends or `signals` resolves. A
/// signal during staging abandons it and ends the run cleanly. The staging directory is removed
/// on every exit path. `connect` is only called once staging has
/// succeeded and the run is not a dry run.
///
/// # Errors
///
/// Resolution, fetch, staging and config-generation errors abort before the engine is touched.
/// Errors from `connect` are returned as-is.
/// Engine errors from pull, create or start are returned after cleanup. Shutdown failures are
/// logged only.
pub async fn run_session<C, S, O, E>(
    request: &MockRequest,
    fetcher: &ContentFetcher,
    connect: C,
    signals: S,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<SessionReport>
where
    C: FnOnce() -> Result<Arc<dyn ContainerRuntime>>,
    S: Future<Output = &'static str> + Send + 'static,
    O: AsyncWrite + Unpin + ?Sized,
    E: AsyncWrite + Unpin + ?Sized,
{
    let manifest = Manifest::load(&request.manifest_path)?;
    tracing::info!("using manifest: {}", request.manifest_path.display());

    let staging = match &request.staging_root {
        Some(root) => StagingArea::create_in(root, request.staging)?,
        None => StagingArea::create(request.staging)?,
    };
    let mut report = SessionReport {
        staging_dir: staging.path().to_path_buf(),
        ..SessionReport::default()
    };

    let outcome = run_staged(
        request, fetcher, connect, signals, stdout, stderr, &manifest, &staging, &mut report,
    )
    .await;

    if let Err(e) = staging.close() {
        tracing::warn!(error = %e, "failed to remove staging directory");
    }
    outcome.map(|()| report)
}

#[allow(clippy::too_many_arguments)]
async fn run_staged<C, S, O, E>(
    request: &MockRequest,
    fetcher: &ContentFetcher,
    connect: C,
    signals: S,
    stdout: &mut O,
    stderr: &mut E,
    manifest: &Manifest,
    staging: &StagingArea,
    report: &mut SessionReport,
) -> Result<()>
where
    C: FnOnce() -> Result<Arc<dyn ContainerRuntime>>,
    S: Future<Output = &'static str> + Send + 'static,
    O: AsyncWrite + Unpin + ?Sized,
    E: AsyncWrite + Unpin + ?Sized,
{
    let mut signals = Box::pin(signals);
    let bundled = tokio::select! {
        bundled = bundle(
            staging,
            fetcher,
            &request.manifest_path,
            manifest,
            request.template_manifest,
        ) => bundled?,
        signal = &mut signals => {
            tracing::info!("received {signal} while staging, shutting down");
            report.interrupted = Some(signal);
            return Ok(());
        }
    };
    report.bundle = bundled;
    for (name, reason) in &report.bundle.skipped {
        tracing::warn!(dependency = %name, "skipped: {reason}");
    }
    tracing::info!(
        "staged {} spec(s) in {}",
        report.bundle.specs.len(),
        staging.path().display()
    );

    if request.dry_run {
        for file in staging.staged_files()? {
            tracing::info!("staged file: {}", file.display());
        }
        return Ok(());
    }

    let engine = Arc::new(ContainerEngine::new(
        connect()?,
        staging.path(),
        request.engine.clone(),
    ));
    let supervisor = SignalSupervisor::watch(signals, CancellationToken::new(), engine.clone());

    let driven = drive(&engine, supervisor.token(), stdout, stderr).await;

    if let Err(e) = engine.shutdown().await {
        tracing::warn!(error = %e, "mock engine shutdown incomplete");
    }
    supervisor.finish().await;
    report.history = engine.history();

    report.started = driven?;
    Ok(())
}

/// Bring the engine up and block on its output until it ends or shutdown is requested.
async fn drive<O, E>(
    engine: &ContainerEngine,
    shutdown: &CancellationToken,
    stdout: &mut O,
    stderr: &mut E,
) -> Result<bool>
where
    O: AsyncWrite + Unpin + ?Sized,
    E: AsyncWrite + Unpin + ?Sized,
{
    if !engine.bring_up(shutdown).await? {
        tracing::info!("shutdown requested before the mock engine started");
        return Ok(false);
    }

    tokio::select! {
        copied = engine.copy_logs(stdout, stderr) => copied?,
        () = shutdown.cancelled() => {}
    }
    Ok(true)
}
