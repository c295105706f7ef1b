//! Resolution of dependency spec locations relative to their manifest.
//!
//! Policy for locations that cannot be used:
//! - an unrecognised URL scheme is skipped with a warning ([`Resolution::Skipped`]), so one bad
//!   dependency does not block the others;
//! - everything else (missing `spec`, malformed `http(s)` URL) is an error.
//!
//! Whether the resolved location can actually be read is decided later by the fetcher, and a
//! failed fetch aborts the run.

use crate::error::{ManifestError, Result};
use opendeps_fetch::{FetchError, SourceLocation};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Located(SourceLocation),
    Skipped { reason: String },
}

/// Resolves spec locations against the directory of one manifest.
#[derive(Debug, Clone)]
pub struct PathResolver {
    manifest_dir: PathBuf,
}

impl PathResolver {
    #[must_use]
    pub fn for_manifest(manifest_path: &Path) -> Self {
        let manifest_dir = manifest_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self { manifest_dir }
    }

    #[must_use]
    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    /// Resolve the `spec` of dependency `name`.
    ///
    /// `./x` and other relative paths are joined to the manifest directory; absolute paths,
    /// `file:` URIs and `http(s)` URLs pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::MissingSpec`] for an empty location and
    /// [`ManifestError::Fetch`] for a malformed `http(s)` URL.
    pub fn resolve(&self, name: &str, spec: &str) -> Result<Resolution> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(ManifestError::MissingSpec {
                name: name.to_string(),
            });
        }

        if let Some(relative) = spec.strip_prefix("./") {
            return Ok(Resolution::Located(SourceLocation::LocalFile(
                self.manifest_dir.join(relative),
            )));
        }

        match SourceLocation::parse(spec) {
            Ok(SourceLocation::LocalFile(path)) if path.is_relative() => Ok(Resolution::Located(
                SourceLocation::LocalFile(self.manifest_dir.join(path)),
            )),
            Ok(location) => Ok(Resolution::Located(location)),
            Err(FetchError::UnsupportedScheme { location, scheme }) => {
                tracing::warn!(
                    dependency = %name,
                    "skipping spec '{location}': unsupported scheme '{scheme}'"
                );
                Ok(Resolution::Skipped {
                    reason: format!("unsupported scheme '{scheme}'"),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(resolution: Resolution) -> SourceLocation {
        match resolution {
            Resolution::Located(loc) => loc,
            Resolution::Skipped { reason } => panic!("unexpectedly skipped: {reason}"),
        }
    }

    #[test]
    fn dot_slash_joins_manifest_dir() {
        let resolver = PathResolver::for_manifest(Path::new("/tmp/x/opendeps.yaml"));
        assert_eq!(
            located(resolver.resolve("pets", "./pets.yaml").expect("resolve")),
            SourceLocation::LocalFile(PathBuf::from("/tmp/x/pets.yaml"))
        );
        assert_eq!(
            located(resolver.resolve("pets", "./specs/v2/pets.yaml").expect("resolve")),
            SourceLocation::LocalFile(PathBuf::from("/tmp/x/specs/v2/pets.yaml"))
        );
    }

    #[test]
    fn dot_slash_is_independent_of_manifest_location() {
        for dir in ["/tmp/x", "/srv/app/deps", "/"] {
            let manifest = Path::new(dir).join("opendeps.yaml");
            let resolver = PathResolver::for_manifest(&manifest);
            assert_eq!(
                located(resolver.resolve("pets", "./pets.yaml").expect("resolve")),
                SourceLocation::LocalFile(Path::new(dir).join("pets.yaml"))
            );
        }
    }

    #[test]
    fn bare_relative_paths_join_manifest_dir() {
        let resolver = PathResolver::for_manifest(Path::new("/tmp/x/opendeps.yaml"));
        assert_eq!(
            located(resolver.resolve("pets", "specs/pets.yaml").expect("resolve")),
            SourceLocation::LocalFile(PathBuf::from("/tmp/x/specs/pets.yaml"))
        );
    }

    #[test]
    fn absolute_paths_and_urls_pass_through() {
        let resolver = PathResolver::for_manifest(Path::new("/tmp/x/opendeps.yaml"));
        assert_eq!(
            located(resolver.resolve("pets", "/abs/pets.yaml").expect("resolve")),
            SourceLocation::LocalFile(PathBuf::from("/abs/pets.yaml"))
        );
        assert_eq!(
            located(resolver.resolve("pets", "file:///abs/pets.yaml").expect("resolve")),
            SourceLocation::LocalFileUri(PathBuf::from("/abs/pets.yaml"))
        );
        let url = located(
            resolver
                .resolve("pets", "https://specs.example.com/pets.yaml")
                .expect("resolve"),
        );
        assert!(url.is_remote());
    }

    #[test]
    fn unknown_scheme_is_skipped() {
        let resolver = PathResolver::for_manifest(Path::new("/tmp/x/opendeps.yaml"));
        let resolution = resolver
            .resolve("pets", "ftp://specs.example.com/pets.yaml")
            .expect("resolve");
        assert!(matches!(resolution, Resolution::Skipped { .. }));
    }

    #[test]
    fn empty_spec_is_an_error() {
        let resolver = PathResolver::for_manifest(Path::new("/tmp/x/opendeps.yaml"));
        let err = resolver.resolve("pets", "  ").unwrap_err();
        assert!(matches!(err, ManifestError::MissingSpec { ref name } if name == "pets"));
    }
}
