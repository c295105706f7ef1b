//! Mock engine configuration documents.
//!
//! One document is written next to every staged spec, named `<spec file>-config.yaml` (or a
//! disambiguated variant). The engine discovers these files in its config directory.

use crate::error::{MockError, Result};
use crate::staging::{StagingArea, StagingPolicy};
use opendeps_manifest::naming::adjacent_file_path;
use serde::Deserialize;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Plugin identifier for the engine's `OpenAPI` mock.
pub const OPENAPI_PLUGIN: &str = "openapi";

/// Suffix appended to a spec's filename to name its configuration.
pub const CONFIG_SUFFIX: &str = "-config.yaml";

/// Well-known endpoint serving the manifest itself.
pub const MANIFEST_ENDPOINT_PATH: &str = "/.well-known/opendeps/manifest.yaml";

/// Filename of the synthetic spec describing [`MANIFEST_ENDPOINT_PATH`].
pub const MANIFEST_SPEC_FILENAME: &str = "opendeps-openapi-gen.yaml";

const MANIFEST_SPEC: &str = r#"---
openapi: "3.0.1"

info:
  title: OpenDeps Manifest endpoint
  version: "1.0.0"

paths:
  /.well-known/opendeps/manifest.yaml:
    get:
      responses:
        '200':
          description: Returns the OpenDeps manifest
          content:
            text/x-yaml:
              schema:
                type: object
"#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockConfig {
    pub plugin: String,
    /// Spec filename relative to the config directory.
    pub spec_file: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// A response override for one path + method.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub response: Option<ResponseConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    /// File in the config directory served as the response body.
    #[serde(default)]
    pub static_file: Option<String>,
    /// Run the response body through the engine's template processor.
    #[serde(default)]
    pub template: bool,
}

impl MockConfig {
    #[must_use]
    pub fn for_spec(spec_file: &str, resources: Vec<Resource>) -> Self {
        Self {
            plugin: OPENAPI_PLUGIN.to_string(),
            spec_file: spec_file.to_string(),
            resources,
        }
    }

    /// Render as YAML. String values are written double-quoted so filenames and paths are never
    /// reinterpreted as other YAML types; `serde_yaml` emits them as plain scalars, and the
    /// engine expects `specFile` quoted.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("---\n");
        let _ = writeln!(out, "plugin: {}", self.plugin);
        let _ = writeln!(out, "specFile: {}", quoted(&self.spec_file));

        if !self.resources.is_empty() {
            out.push_str("\nresources:\n");
            for resource in &self.resources {
                let _ = writeln!(out, "- path: {}", quoted(&resource.path));
                let _ = writeln!(out, "  method: {}", resource.method);
                if let Some(response) = &resource.response {
                    out.push_str("  response:\n");
                    if let Some(static_file) = &response.static_file {
                        let _ = writeln!(out, "    staticFile: {}", quoted(static_file));
                    }
                    if response.template {
                        out.push_str("    template: true\n");
                    }
                }
            }
        }
        out
    }
}

fn quoted(value: &str) -> String {
    // A JSON string literal is a valid YAML double-quoted scalar.
    serde_json::Value::from(value).to_string()
}

/// Write a mock configuration for the spec at `spec_path`, next to it. Returns the config path.
///
/// The configuration references the spec by filename only, so it resolves inside the
/// container's view of the directory.
///
/// # Errors
///
/// Returns [`MockError::ConfigGeneration`] if the file cannot be written.
pub fn generate_config(
    spec_path: &Path,
    resources: Vec<Resource>,
    policy: StagingPolicy,
) -> Result<PathBuf> {
    let spec_file = spec_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let config_path = adjacent_file_path(spec_path, CONFIG_SUFFIX, policy.force_overwrite);
    let document = MockConfig::for_spec(&spec_file, resources).render();

    let write_err = |e: std::io::Error| MockError::ConfigGeneration {
        path: config_path.clone(),
        source: e,
    };
    let mut file = std::fs::File::create(&config_path).map_err(write_err)?;
    file.write_all(document.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;

    tracing::debug!(config = %config_path.display(), spec = %spec_file, "wrote mock config");
    Ok(config_path)
}

/// Stage the synthetic spec for [`MANIFEST_ENDPOINT_PATH`] and its configuration, which serves
/// `manifest_file` (already staged) as a static, optionally templated, response.
///
/// Returns `(spec path, config path)`.
///
/// # Errors
///
/// Returns [`MockError::Staging`] if the spec cannot be written and
/// [`MockError::ConfigGeneration`] if its configuration cannot be written.
pub fn generate_manifest_endpoint(
    staging: &StagingArea,
    manifest_file: &str,
    template: bool,
) -> Result<(PathBuf, PathBuf)> {
    let spec_path = staging.write_file(MANIFEST_SPEC_FILENAME, MANIFEST_SPEC.as_bytes())?;

    let resources = vec![Resource {
        path: MANIFEST_ENDPOINT_PATH.to_string(),
        method: "GET".to_string(),
        response: Some(ResponseConfig {
            static_file: Some(manifest_file.to_string()),
            template,
        }),
    }];
    let config_path = generate_config(&spec_path, resources, staging.policy())?;
    Ok((spec_path, config_path))
}
