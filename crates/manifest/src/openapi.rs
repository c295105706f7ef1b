//! Partial `OpenAPI` parsing.
//!
//! Only the parts OpenDeps uses are read: `info.title`, `info.version`, `servers` and the
//! operation names under `paths`. Everything else is ignored.

use crate::error::{ManifestError, Result};
use opendeps_fetch::{ContentFetcher, SourceLocation};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialOpenApi {
    /// `OpenAPI` 3.x version marker (may be written as a number in YAML).
    #[serde(default)]
    pub openapi: Option<serde_yaml::Value>,
    /// Swagger 2.0 version marker.
    #[serde(default)]
    pub swagger: Option<serde_yaml::Value>,
    #[serde(default)]
    pub info: SpecInfo,
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Path -> method (or other path-item key) -> opaque operation.
    #[serde(default)]
    pub paths: BTreeMap<String, BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "deserialize_version")]
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

impl PartialOpenApi {
    /// Parse YAML or JSON text. `location` is only used for error context.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] if the text is not a mapping with the expected shape.
    pub fn parse(raw: &str, location: &str) -> Result<Self> {
        // JSON is a valid subset of YAML, so serde_yaml alone is enough.
        let spec: Self = serde_yaml::from_str(raw).map_err(|e| ManifestError::Parse {
            location: location.to_string(),
            source: e,
        })?;
        tracing::trace!(location, title = %spec.info.title, "openapi parsed");
        Ok(spec)
    }

    /// Fetch and parse a spec from any supported location.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Fetch`] if the content cannot be read and
    /// [`ManifestError::Parse`] if it cannot be parsed.
    pub async fn load(fetcher: &ContentFetcher, source: &SourceLocation) -> Result<Self> {
        let raw = fetcher.read_to_string(source).await?;
        Self::parse(&raw, &source.to_string())
    }

    /// Whether the document declares itself as `OpenAPI` or Swagger.
    #[must_use]
    pub fn is_openapi_document(&self) -> bool {
        self.openapi.is_some() || self.swagger.is_some()
    }

    /// First path (in sorted order) that has a `GET` operation, or `/`.
    #[must_use]
    pub fn first_get_path(&self) -> &str {
        self.paths
            .iter()
            .find(|(_, operations)| operations.contains_key("get"))
            .map_or("/", |(path, _)| path.as_str())
    }
}

/// Accept `version: 1.0` (a YAML float) as well as `version: "1.0"`.
fn deserialize_version<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}
