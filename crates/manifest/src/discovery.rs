//! Locating a manifest file.

use crate::error::{ManifestError, Result};
use std::path::{Path, PathBuf};

/// Well-known manifest filenames, in search order.
pub const DEFAULT_MANIFEST_FILENAMES: &[&str] = &["opendeps.yaml", "opendeps.yml"];

/// Find the manifest to operate on.
///
/// With no argument the current working directory is searched for a well-known filename.
/// A directory argument is searched the same way; a file argument is returned as an absolute
/// path.
///
/// # Errors
///
/// Returns [`ManifestError::NotFound`] if nothing matches and [`ManifestError::Stat`] if the
/// filesystem cannot be queried.
pub fn find_manifest(arg: Option<&Path>) -> Result<PathBuf> {
    let Some(arg) = arg else {
        let cwd = std::env::current_dir().map_err(|e| ManifestError::Stat {
            path: PathBuf::from("."),
            source: e,
        })?;
        return find_manifest_in_dir(&cwd);
    };

    let abs = std::path::absolute(arg).map_err(|e| ManifestError::Stat {
        path: arg.to_path_buf(),
        source: e,
    })?;
    let metadata = match std::fs::metadata(&abs) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ManifestError::NotFound { path: abs });
        }
        Err(e) => return Err(ManifestError::Stat { path: abs, source: e }),
    };

    if metadata.is_dir() {
        find_manifest_in_dir(&abs)
    } else {
        Ok(abs)
    }
}

fn find_manifest_in_dir(dir: &Path) -> Result<PathBuf> {
    for name in DEFAULT_MANIFEST_FILENAMES {
        let candidate = dir.join(name);
        match std::fs::metadata(&candidate) {
            Ok(_) => {
                tracing::debug!(path = %candidate.display(), "found manifest");
                return Ok(candidate);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ManifestError::Stat {
                    path: candidate,
                    source: e,
                });
            }
        }
    }
    Err(ManifestError::NotFound {
        path: dir.to_path_buf(),
    })
}
