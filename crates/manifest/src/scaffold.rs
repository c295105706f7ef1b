//! Reverse-generation of a manifest from a directory of `OpenAPI` documents.

use crate::error::{ManifestError, Result};
use crate::model::{Availability, Dependency, Info, Manifest, OPENDEPS_SCHEMA_VERSION};
use crate::naming::next_available_path;
use crate::openapi::PartialOpenApi;
use std::io::Write as _;
use std::path::{Path, PathBuf};

const SPEC_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// List the `OpenAPI` documents directly inside `dir`, sorted by path.
///
/// Files with a YAML/JSON extension that do not parse, or do not declare `openapi`/`swagger`,
/// are ignored.
///
/// # Errors
///
/// Returns [`ManifestError::Read`] if the directory cannot be listed.
pub fn discover_openapi_specs(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_err = |e: std::io::Error| ManifestError::Read {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut specs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let has_spec_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SPEC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !has_spec_extension || !path.is_file() {
            continue;
        }

        let Ok(raw) = std::fs::read_to_string(&path) else {
            tracing::debug!(path = %path.display(), "skipping unreadable file");
            continue;
        };
        match PartialOpenApi::parse(&raw, &path.display().to_string()) {
            Ok(spec) if spec.is_openapi_document() => specs.push(path),
            Ok(_) => tracing::debug!(path = %path.display(), "not an OpenAPI document"),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping"),
        }
    }
    specs.sort();
    Ok(specs)
}

/// Build a manifest describing each spec in `specs` as a dependency.
///
/// Dependencies are named by file stem and point at their spec with a `./` path, so the
/// manifest is meant to live in `dir`.
///
/// # Errors
///
/// Returns [`ManifestError::Read`] or [`ManifestError::Parse`] if a spec cannot be read.
pub fn build_manifest(dir: &Path, specs: &[PathBuf]) -> Result<Manifest> {
    let dir_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut manifest = Manifest {
        opendeps: OPENDEPS_SCHEMA_VERSION.to_string(),
        info: Some(Info {
            title: format!("OpenDeps manifest for {dir_name}"),
            version: "1.0.0".to_string(),
            ..Info::default()
        }),
        ..Manifest::default()
    };

    for spec_path in specs {
        let raw = std::fs::read_to_string(spec_path).map_err(|e| ManifestError::Read {
            path: spec_path.clone(),
            source: e,
        })?;
        let spec = PartialOpenApi::parse(&raw, &spec_path.display().to_string())?;

        let file_name = spec_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = spec_path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());

        manifest.dependencies.insert(
            name,
            Dependency {
                summary: spec.info.title.clone(),
                spec: format!("./{file_name}"),
                version: spec.info.version.clone(),
                availability: Some(Availability {
                    path: spec.first_get_path().to_string(),
                    ..Availability::default()
                }),
                ..Dependency::default()
            },
        );
    }
    Ok(manifest)
}

/// Write `manifest` into `dir` as `opendeps.yaml`, or `opendeps-N.yaml` if that name is taken
/// and `force_overwrite` is false. Returns the written path.
///
/// # Errors
///
/// Returns [`ManifestError::Yaml`] if serialization fails and [`ManifestError::Write`] if the
/// file cannot be written.
pub fn write_manifest(dir: &Path, manifest: &Manifest, force_overwrite: bool) -> Result<PathBuf> {
    let path = next_available_path(dir, "opendeps", ".yaml", force_overwrite);
    let yaml = manifest.to_yaml_string()?;

    let write_err = |e: std::io::Error| ManifestError::Write {
        path: path.clone(),
        source: e,
    };
    let mut file = std::fs::File::create(&path).map_err(write_err)?;
    file.write_all(yaml.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    Ok(path)
}

/// Discover specs in `dir`, build a manifest and write it next to them.
///
/// # Errors
///
/// Propagates errors from [`discover_openapi_specs`], [`build_manifest`] and
/// [`write_manifest`].
pub fn scaffold_manifest(dir: &Path, force_overwrite: bool) -> Result<PathBuf> {
    let specs = discover_openapi_specs(dir)?;
    tracing::info!("found {} OpenAPI spec(s)", specs.len());

    let manifest = build_manifest(dir, &specs)?;
    let path = write_manifest(dir, &manifest, force_overwrite)?;
    tracing::info!("wrote OpenDeps manifest file: {}", path.display());
    Ok(path)
}
