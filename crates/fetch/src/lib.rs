//! Uniform content fetching for OpenDeps.
//!
//! Manifests and the `OpenAPI` documents they reference can live on disk or behind HTTP.
//! This crate classifies a location string once ([`SourceLocation`]) and exposes a single
//! reader ([`ContentFetcher`]) over every supported form:
//! - bare filesystem paths (absolute or already resolved)
//! - `file:` and `file://` URIs
//! - `http://` and `https://` URLs

pub mod error;
pub mod fetcher;
pub mod redact;
pub mod source;

pub use error::{FetchError, Result};
pub use fetcher::{ContentFetcher, ContentStream};
pub use source::SourceLocation;
