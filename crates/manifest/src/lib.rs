//! OpenDeps manifest handling.
//!
//! - [`model`]: the manifest document (`opendeps.yaml`)
//! - [`discovery`]: locating a manifest from a CLI argument or working directory
//! - [`resolver`]: turning a dependency's `spec` into a fetchable [`SourceLocation`]
//! - [`openapi`]: the small slice of an `OpenAPI` document OpenDeps reads
//! - [`naming`]: collision-safe naming for files generated next to other files
//! - [`scaffold`]: reverse-generating a manifest from a directory of `OpenAPI` files
//!
//! [`SourceLocation`]: opendeps_fetch::SourceLocation

pub mod discovery;
pub mod error;
pub mod model;
pub mod naming;
pub mod openapi;
pub mod resolver;
pub mod scaffold;

pub use error::{ManifestError, Result};
pub use model::Manifest;
