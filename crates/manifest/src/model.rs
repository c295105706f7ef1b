//! The OpenDeps manifest document.

use crate::error::{ManifestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Manifest schema version written by this tool.
pub const OPENDEPS_SCHEMA_VERSION: &str = "0.1.0";

/// A parsed `opendeps.yaml`. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version tag.
    #[serde(default)]
    pub opendeps: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,

    /// Dependencies keyed by name. Order carries no meaning.
    #[serde(default)]
    pub dependencies: BTreeMap<String, Dependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Spec location: `./relative`, absolute path, `file:` URI or `http(s)` URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub spec: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
}

/// How to check that a dependency is reachable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// Fully qualified URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Path joined with the dependency's server base URL.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Name of a security config. Not supported by the availability check.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub security: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub security_configs: BTreeMap<String, SecurityConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheme: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
}

impl Manifest {
    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Read`] if the file cannot be read and
    /// [`ManifestError::Parse`] if it is not a valid manifest document.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let manifest = Self::from_yaml_str(&raw, &path.display().to_string())?;
        tracing::trace!(?manifest, "opendeps parsed");
        Ok(manifest)
    }

    /// Parse a manifest from YAML text. `location` is only used for error context.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] if the text is not a valid manifest document.
    pub fn from_yaml_str(raw: &str, location: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| ManifestError::Parse {
            location: location.to_string(),
            source: e,
        })
    }

    /// Serialize back to YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Yaml`] if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
