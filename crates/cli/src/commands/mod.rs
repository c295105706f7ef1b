pub mod mock;
pub mod scaffold;
pub mod test;
pub mod validate;

use anyhow::Context as _;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for spec, schema and availability requests. Every request is bounded.
pub(crate) fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("build HTTP client")
}
