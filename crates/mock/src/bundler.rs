//! Populating a staging directory from a manifest.

use crate::error::Result;
use crate::mock_config::{generate_config, generate_manifest_endpoint};
use crate::staging::{ResolvedArtifact, StagingArea};
use opendeps_fetch::{ContentFetcher, SourceLocation};
use opendeps_manifest::Manifest;
use opendeps_manifest::resolver::{PathResolver, Resolution};
use std::path::{Path, PathBuf};

/// Filename of the staged manifest, served by the manifest endpoint.
pub const STAGED_MANIFEST_FILENAME: &str = "opendeps.yaml";

/// A spec staged for the engine, with its generated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSpec {
    /// Dependency name, or `None` for the synthetic manifest endpoint spec.
    pub dependency: Option<String>,
    pub spec: PathBuf,
    pub config: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    pub manifest: PathBuf,
    pub specs: Vec<StagedSpec>,
    /// Dependencies left out, with the reason.
    pub skipped: Vec<(String, String)>,
}

/// Copy the manifest into the staging directory and add the endpoint that serves it.
///
/// # Errors
///
/// Returns [`MockError::Fetch`] if the manifest cannot be read, and staging or
/// config-generation errors if anything cannot be written.
///
/// [`MockError::Fetch`]: crate::error::MockError::Fetch
pub async fn bundle_manifest(
    staging: &StagingArea,
    fetcher: &ContentFetcher,
    manifest_path: &Path,
    template: bool,
) -> Result<(PathBuf, StagedSpec)> {
    tracing::debug!("bundling manifest: {}", manifest_path.display());
    let artifact = ResolvedArtifact {
        name: STAGED_MANIFEST_FILENAME.to_string(),
        source: SourceLocation::LocalFile(manifest_path.to_path_buf()),
        file_name: STAGED_MANIFEST_FILENAME.to_string(),
    };
    let staged_manifest = staging.stage(fetcher, &artifact).await?;
    let manifest_file = file_name_of(&staged_manifest);

    let (spec, config) = generate_manifest_endpoint(staging, &manifest_file, template)?;
    Ok((
        staged_manifest,
        StagedSpec {
            dependency: None,
            spec,
            config,
        },
    ))
}

/// Stage every dependency spec and write a configuration for each.
///
/// Dependencies with an unsupported location scheme are skipped with a warning; any fetch,
/// staging or generation failure aborts.
///
/// # Errors
///
/// Returns resolution, fetch, staging or config-generation errors.
pub async fn bundle_specs(
    staging: &StagingArea,
    fetcher: &ContentFetcher,
    manifest_path: &Path,
    manifest: &Manifest,
) -> Result<(Vec<StagedSpec>, Vec<(String, String)>)> {
    let resolver = PathResolver::for_manifest(manifest_path);
    let mut staged = Vec::with_capacity(manifest.dependencies.len());
    let mut skipped = Vec::new();

    for (name, dependency) in &manifest.dependencies {
        let source = match resolver.resolve(name, &dependency.spec)? {
            Resolution::Located(source) => source,
            Resolution::Skipped { reason } => {
                skipped.push((name.clone(), reason));
                continue;
            }
        };
        tracing::debug!(dependency = %name, "bundling openapi spec: {source}");

        let spec = staging
            .stage(fetcher, &ResolvedArtifact::new(name, source))
            .await?;
        let config = generate_config(&spec, Vec::new(), staging.policy())?;
        staged.push(StagedSpec {
            dependency: Some(name.clone()),
            spec,
            config,
        });
    }
    Ok((staged, skipped))
}

/// Stage the manifest, its endpoint and every dependency spec.
///
/// # Errors
///
/// See [`bundle_manifest`] and [`bundle_specs`].
pub async fn bundle(
    staging: &StagingArea,
    fetcher: &ContentFetcher,
    manifest_path: &Path,
    manifest: &Manifest,
    template: bool,
) -> Result<BundleReport> {
    let (staged_manifest, endpoint) =
        bundle_manifest(staging, fetcher, manifest_path, template).await?;
    let (mut specs, skipped) = bundle_specs(staging, fetcher, manifest_path, manifest).await?;
    specs.insert(0, endpoint);

    Ok(BundleReport {
        manifest: staged_manifest,
        specs,
        skipped,
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
