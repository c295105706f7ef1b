use crate::config::{CliConfig, DEFAULT_SCHEMA_URL};
use anyhow::Context as _;
use clap::Args;
use opendeps_fetch::{ContentFetcher, SourceLocation};
use opendeps_manifest::discovery::find_manifest;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Manifest file, or a directory containing `opendeps.yaml` [default: current directory]
    pub manifest: Option<PathBuf>,

    /// JSON schema location (URL or file) [default: the published OpenDeps schema]
    #[arg(long, env = "OPENDEPS_SCHEMA_URL")]
    pub schema: Option<String>,

    /// Exit with a non-zero status if the document is not valid
    #[arg(long)]
    pub strict: bool,
}

/// Read a YAML manifest as a JSON value.
pub fn load_document(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read manifest {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("error parsing YAML at {}", path.display()))
}

/// Validate `document` against `schema`. Returns one message per violation.
pub fn validate_document(schema: &Value, document: &Value) -> anyhow::Result<Vec<String>> {
    let validator =
        jsonschema::validator_for(schema).map_err(|e| anyhow::anyhow!("invalid schema: {e}"))?;
    Ok(validator
        .iter_errors(document)
        .map(|e| {
            let at = e.instance_path().to_string();
            if at.is_empty() {
                e.to_string()
            } else {
                format!("{at}: {e}")
            }
        })
        .collect())
}

pub async fn run(args: ValidateArgs, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let manifest_path = find_manifest(args.manifest.as_deref())?;
    tracing::info!("validating opendeps manifest: {}", manifest_path.display());
    let document = load_document(&manifest_path)?;

    let schema_location = args
        .schema
        .or_else(|| config.schema_url.clone())
        .unwrap_or_else(|| DEFAULT_SCHEMA_URL.to_string());
    let source = SourceLocation::parse(&schema_location)?;
    tracing::debug!("loading schema: {source}");
    let raw = ContentFetcher::with_client(super::http_client()?)
        .read_to_string(&source)
        .await
        .with_context(|| format!("load schema {source}"))?;
    let schema: Value =
        serde_json::from_str(&raw).with_context(|| format!("parse schema {source}"))?;

    // Compilation may resolve remote references with blocking I/O.
    let errors = tokio::task::spawn_blocking(move || validate_document(&schema, &document))
        .await
        .context("schema validation task failed")??;

    if errors.is_empty() {
        tracing::info!("The document is valid");
        return Ok(ExitCode::SUCCESS);
    }
    tracing::warn!("The document is not valid. see errors:");
    for error in &errors {
        tracing::warn!("- {error}");
    }
    Ok(if args.strict {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
