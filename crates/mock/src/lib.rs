//! Mock-engine lifecycle for OpenDeps.
//!
//! Given a manifest, this crate stages a self-contained directory (manifest, every dependency
//! spec, one mock configuration per spec) and runs a containerized `OpenAPI` mock engine
//! against it until the container stops or the process is asked to shut down.
//!
//! - [`staging`]: the ephemeral working directory
//! - [`mock_config`]: per-spec mock configuration documents
//! - [`bundler`]: populating the staging directory from a manifest
//! - [`engine`]: container lifecycle (`pull -> create -> start -> stop`)
//! - [`supervisor`]: signal-driven shutdown
//! - [`session`]: the end-to-end `mock` flow

pub mod bundler;
pub mod engine;
pub mod error;
pub mod mock_config;
pub mod session;
pub mod staging;
pub mod supervisor;

pub use engine::{ContainerEngine, ContainerRuntime, EngineOptions, EngineState, PullPolicy};
pub use error::{MockError, Result};
pub use session::{MockRequest, SessionReport, run_session};
pub use staging::{StagingArea, StagingPolicy};
