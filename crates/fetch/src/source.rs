//! Classification of location strings.
//!
//! Every location is classified exactly once, up front. Readers then switch on the finite
//! [`SourceLocation`] variants instead of re-checking string prefixes.

use crate::error::{FetchError, Result};
use crate::redact::redact_url;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLocation {
    /// A plain filesystem path.
    LocalFile(PathBuf),
    /// A `file:` or `file://` URI, stored with the scheme prefix removed.
    LocalFileUri(PathBuf),
    /// An `http://` or `https://` URL.
    Http(Url),
}

impl SourceLocation {
    /// Classify a location string.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] for a malformed `http(s)` URL and
    /// [`FetchError::UnsupportedScheme`] for any other URL scheme (e.g. `ftp://`).
    pub fn parse(location: &str) -> Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let url = Url::parse(location).map_err(|e| FetchError::InvalidUrl {
                location: location.to_string(),
                message: e.to_string(),
            })?;
            return Ok(Self::Http(url));
        }

        if let Some(path) = location.strip_prefix("file://") {
            return Ok(Self::LocalFileUri(PathBuf::from(path)));
        }
        if let Some(path) = location.strip_prefix("file:") {
            return Ok(Self::LocalFileUri(PathBuf::from(path)));
        }

        if let Some((scheme, _)) = location.split_once("://")
            && is_scheme(scheme)
        {
            return Err(FetchError::UnsupportedScheme {
                location: location.to_string(),
                scheme: scheme.to_string(),
            });
        }

        Ok(Self::LocalFile(PathBuf::from(location)))
    }

    /// The filesystem path for local variants.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::LocalFile(p) | Self::LocalFileUri(p) => Some(p),
            Self::Http(_) => None,
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Last path segment of the location, if it has one.
    ///
    /// Used to pick a staging filename for the fetched content.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::LocalFile(p) | Self::LocalFileUri(p) => p
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            Self::Http(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalFile(p) => write!(f, "{}", p.display()),
            Self::LocalFileUri(p) => write!(f, "file://{}", p.display()),
            Self::Http(url) => f.write_str(&redact_url(url)),
        }
    }
}

/// RFC 3986 scheme syntax; single letters are excluded so Windows drive letters stay paths.
fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    candidate.len() > 1
        && first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_and_https() {
        let loc = SourceLocation::parse("https://example.com/specs/pets.yaml").expect("parse");
        assert!(loc.is_remote());
        assert_eq!(loc.file_name().as_deref(), Some("pets.yaml"));

        let loc = SourceLocation::parse("http://127.0.0.1:9000/openapi.json").expect("parse");
        assert!(matches!(loc, SourceLocation::Http(_)));
    }

    #[test]
    fn strips_file_scheme_prefixes() {
        assert_eq!(
            SourceLocation::parse("file:///tmp/x/pets.yaml").expect("parse"),
            SourceLocation::LocalFileUri(PathBuf::from("/tmp/x/pets.yaml"))
        );
        assert_eq!(
            SourceLocation::parse("file:/tmp/x/pets.yaml").expect("parse"),
            SourceLocation::LocalFileUri(PathBuf::from("/tmp/x/pets.yaml"))
        );
        assert_eq!(
            SourceLocation::parse("file:relative/pets.yaml").expect("parse"),
            SourceLocation::LocalFileUri(PathBuf::from("relative/pets.yaml"))
        );
    }

    #[test]
    fn bare_paths_are_local_files() {
        assert_eq!(
            SourceLocation::parse("/abs/pets.yaml").expect("parse"),
            SourceLocation::LocalFile(PathBuf::from("/abs/pets.yaml"))
        );
        assert_eq!(
            SourceLocation::parse("./pets.yaml").expect("parse"),
            SourceLocation::LocalFile(PathBuf::from("./pets.yaml"))
        );
    }

    #[test]
    fn rejects_unknown_schemes() {
        let err = SourceLocation::parse("ftp://example.com/pets.yaml").unwrap_err();
        assert!(matches!(
            err,
            FetchError::UnsupportedScheme { ref scheme, .. } if scheme == "ftp"
        ));
    }

    #[test]
    fn rejects_malformed_http_url() {
        let err = SourceLocation::parse("http://exa mple.com/pets.yaml").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn url_without_path_segment_has_no_file_name() {
        let loc = SourceLocation::parse("https://example.com/").expect("parse");
        assert_eq!(loc.file_name(), None);
    }

    #[test]
    fn display_redacts_url_credentials() {
        let loc = SourceLocation::parse("https://u:p@example.com/pets.yaml?sig=1").expect("parse");
        assert_eq!(loc.to_string(), "https://example.com/pets.yaml");
    }
}
