//! The staging directory mounted into the mock engine.
//!
//! A [`StagingArea`] is created fresh for every run under the system temp root with a random
//! suffix, and is removed when dropped. Callers keep it alive for exactly as long as the
//! container may read from it.

use crate::error::{MockError, Result};
use opendeps_fetch::{ContentFetcher, FetchError, SourceLocation};
use opendeps_manifest::naming::available_file_path;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STAGING_PREFIX: &str = "opendeps-mock-";

/// Overwrite behaviour for files written into the staging directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingPolicy {
    /// Overwrite an existing file instead of picking a disambiguated name.
    pub force_overwrite: bool,
}

/// A dependency spec ready to be copied into the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Dependency name from the manifest.
    pub name: String,
    pub source: SourceLocation,
    /// Preferred filename inside the staging directory.
    pub file_name: String,
}

impl ResolvedArtifact {
    /// Pair a dependency with its resolved location, naming it after the location's last path
    /// segment (or `<name>.yaml` when there is none).
    #[must_use]
    pub fn new(name: &str, source: SourceLocation) -> Self {
        let file_name = source
            .file_name()
            .unwrap_or_else(|| format!("{name}.yaml"));
        Self {
            name: name.to_string(),
            source,
            file_name,
        }
    }
}

#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    policy: StagingPolicy,
}

impl StagingArea {
    /// Create a fresh, empty staging directory under the system temp root.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Staging`] if the directory cannot be created.
    pub fn create(policy: StagingPolicy) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), policy)
    }

    /// Create a fresh, empty staging directory under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Staging`] if the directory cannot be created.
    pub fn create_in(root: &Path, policy: StagingPolicy) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(root)
            .map_err(|e| MockError::Staging {
                path: root.to_path_buf(),
                source: e,
            })?;
        tracing::debug!(path = %dir.path().display(), "created staging dir");
        Ok(Self { dir, policy })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn policy(&self) -> StagingPolicy {
        self.policy
    }

    /// Destination for `file_name`, applying the collision policy.
    #[must_use]
    pub fn destination_for(&self, file_name: &str) -> PathBuf {
        available_file_path(self.path(), file_name, self.policy.force_overwrite)
    }

    /// Copy an artifact's content into the staging directory. Returns the staged path.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Fetch`] if the source cannot be read (nothing is written in that
    /// case) and [`MockError::Staging`] if the destination cannot be written.
    pub async fn stage(
        &self,
        fetcher: &ContentFetcher,
        artifact: &ResolvedArtifact,
    ) -> Result<PathBuf> {
        let dest = self.destination_for(&artifact.file_name);
        self.ensure_parent(&dest)?;

        match fetcher.copy_to(&artifact.source, &dest).await {
            Ok(bytes) => {
                tracing::debug!(
                    dependency = %artifact.name,
                    dest = %dest.display(),
                    bytes,
                    "staged"
                );
                Ok(dest)
            }
            Err(FetchError::Write { path, source }) => Err(MockError::Staging { path, source }),
            Err(e) => Err(e.into()),
        }
    }

    /// Write generated content into the staging directory. Returns the written path.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Staging`] if the file cannot be written.
    pub fn write_file(&self, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
        let dest = self.destination_for(file_name);
        self.ensure_parent(&dest)?;

        let staging_err = |e: std::io::Error| MockError::Staging {
            path: dest.clone(),
            source: e,
        };
        let mut file = std::fs::File::create(&dest).map_err(staging_err)?;
        file.write_all(contents).map_err(staging_err)?;
        file.sync_all().map_err(staging_err)?;
        Ok(dest)
    }

    /// Files currently in the staging directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Staging`] if the directory cannot be listed.
    pub fn staged_files(&self) -> Result<Vec<PathBuf>> {
        let list_err = |e: std::io::Error| MockError::Staging {
            path: self.path().to_path_buf(),
            source: e,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.path()).map_err(list_err)? {
            files.push(entry.map_err(list_err)?.path());
        }
        files.sort();
        Ok(files)
    }

    /// Remove the staging directory now, reporting failures instead of ignoring them.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::Staging`] if removal fails.
    pub fn close(self) -> Result<()> {
        let path = self.path().to_path_buf();
        self.dir.close().map_err(|e| MockError::Staging { path: path.clone(), source: e })?;
        tracing::debug!(path = %path.display(), "removed staging dir");
        Ok(())
    }

    fn ensure_parent(&self, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent()
            && parent != self.path()
        {
            std::fs::create_dir_all(parent).map_err(|e| MockError::Staging {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn staging_dirs_are_unique_and_removed_on_drop() {
        let root = tempdir().expect("tempdir");
        let a = StagingArea::create_in(root.path(), StagingPolicy::default()).expect("a");
        let b = StagingArea::create_in(root.path(), StagingPolicy::default()).expect("b");
        assert_ne!(a.path(), b.path());
        assert!(a.staged_files().expect("list").is_empty());

        let a_path = a.path().to_path_buf();
        drop(a);
        assert!(!a_path.exists());

        let b_path = b.path().to_path_buf();
        b.close().expect("close");
        assert!(!b_path.exists());
    }

    #[tokio::test]
    async fn same_basename_is_disambiguated_without_force() {
        let root = tempdir().expect("tempdir");
        let (first, second) = two_pets_specs(root.path());
        let staging = StagingArea::create_in(root.path(), StagingPolicy::default()).expect("create");
        let fetcher = ContentFetcher::new();

        let a = staging
            .stage(&fetcher, &ResolvedArtifact::new("pets-v1", first))
            .await
            .expect("stage a");
        let b = staging
            .stage(&fetcher, &ResolvedArtifact::new("pets-v2", second))
            .await
            .expect("stage b");

        assert_eq!(a, staging.path().join("pets.yaml"));
        assert_eq!(b, staging.path().join("pets-1.yaml"));
        assert_eq!(std::fs::read_to_string(&a).expect("read a"), "v1");
        assert_eq!(std::fs::read_to_string(&b).expect("read b"), "v2");
    }

    #[tokio::test]
    async fn same_basename_overwrites_with_force() {
        let root = tempdir().expect("tempdir");
        let (first, second) = two_pets_specs(root.path());
        let staging = StagingArea::create_in(
            root.path(),
            StagingPolicy {
                force_overwrite: true,
            },
        )
        .expect("create");
        let fetcher = ContentFetcher::new();

        let a = staging
            .stage(&fetcher, &ResolvedArtifact::new("pets-v1", first))
            .await
            .expect("stage a");
        let b = staging
            .stage(&fetcher, &ResolvedArtifact::new("pets-v2", second))
            .await
            .expect("stage b");

        assert_eq!(a, b);
        assert_eq!(std::fs::read_to_string(&b).expect("read"), "v2");
        assert_eq!(staging.staged_files().expect("list").len(), 1);
    }

    #[tokio::test]
    async fn missing_source_is_a_fetch_error_and_writes_nothing() {
        let root = tempdir().expect("tempdir");
        let staging = StagingArea::create_in(root.path(), StagingPolicy::default()).expect("create");
        let artifact = ResolvedArtifact::new(
            "pets",
            SourceLocation::LocalFile(root.path().join("missing.yaml")),
        );

        let err = staging
            .stage(&ContentFetcher::new(), &artifact)
            .await
            .unwrap_err();
        assert!(matches!(err, MockError::Fetch(FetchError::Open { .. })));
        assert!(staging.staged_files().expect("list").is_empty());
    }

    #[test]
    fn artifact_name_falls_back_to_dependency_name() {
        let source = SourceLocation::parse("https://specs.example.com/").expect("classify");
        assert_eq!(ResolvedArtifact::new("pets", source).file_name, "pets.yaml");
    }

    #[test]
    fn write_file_applies_collision_policy() {
        let root = tempdir().expect("tempdir");
        let staging = StagingArea::create_in(root.path(), StagingPolicy::default()).expect("create");
        let a = staging.write_file("gen.yaml", b"a").expect("write a");
        let b = staging.write_file("gen.yaml", b"b").expect("write b");
        assert_eq!(a, staging.path().join("gen.yaml"));
        assert_eq!(b, staging.path().join("gen-1.yaml"));
    }

    fn two_pets_specs(root: &Path) -> (SourceLocation, SourceLocation) {
        let v1 = root.join("v1");
        let v2 = root.join("v2");
        std::fs::create_dir_all(&v1).expect("mkdir v1");
        std::fs::create_dir_all(&v2).expect("mkdir v2");
        std::fs::write(v1.join("pets.yaml"), "v1").expect("write v1");
        std::fs::write(v2.join("pets.yaml"), "v2").expect("write v2");
        (
            SourceLocation::LocalFile(v1.join("pets.yaml")),
            SourceLocation::LocalFile(v2.join("pets.yaml")),
        )
    }
}
