use anyhow::Context as _;
use clap::{ArgAction, Args};
use opendeps_fetch::ContentFetcher;
use opendeps_fetch::redact::sanitize_reqwest_error;
use opendeps_manifest::discovery::find_manifest;
use opendeps_manifest::model::Dependency;
use opendeps_manifest::openapi::PartialOpenApi;
use opendeps_manifest::resolver::{PathResolver, Resolution};
use opendeps_manifest::Manifest;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Args, Debug)]
pub struct TestArgs {
    /// Manifest file, or a directory containing `opendeps.yaml` [default: current directory]
    pub manifest: Option<PathBuf>,

    /// Exit with a non-zero status if any dependency is unavailable
    #[arg(short = 'z', long)]
    pub non_zero_exit: bool,

    /// Keep checking further dependencies after a required one is down
    #[arg(short = 'c', long = "continue", default_value_t = true, action = ArgAction::Set)]
    pub continue_if_down: bool,

    /// Treat optional dependencies as required
    #[arg(short = 'o', long)]
    pub require_optional: bool,

    /// Server base URL override for a dependency, e.g. pets=https://pets.example.com
    #[arg(short = 's', long = "server", value_name = "NAME=URL", value_parser = parse_server_override)]
    pub servers: Vec<(String, String)>,
}

fn parse_server_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, url)) if !name.is_empty() && !url.is_empty() => {
            Ok((name.to_string(), url.to_string()))
        }
        _ => Err(format!("expected NAME=URL, got '{raw}'")),
    }
}

/// Join a server base URL and an availability path with exactly one `/` between them.
pub fn availability_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSummary {
    pub tested: usize,
    pub available: usize,
}

impl TestSummary {
    pub fn all_available(&self) -> bool {
        self.available == self.tested
    }
}

/// Probes each dependency's availability endpoint.
#[derive(Debug, Clone)]
pub struct AvailabilityTester {
    fetcher: ContentFetcher,
    client: reqwest::Client,
    servers: HashMap<String, String>,
    require_optional: bool,
    continue_if_down: bool,
}

impl AvailabilityTester {
    pub fn new(args: &TestArgs) -> anyhow::Result<Self> {
        let client = super::http_client()?;
        Ok(Self {
            fetcher: ContentFetcher::with_client(client.clone()),
            client,
            servers: args.servers.iter().cloned().collect(),
            require_optional: args.require_optional,
            continue_if_down: args.continue_if_down,
        })
    }

    /// Check every dependency in name order. Stops at the first required failure unless
    /// configured to continue.
    pub async fn test_all(&self, manifest_path: &Path, manifest: &Manifest) -> TestSummary {
        let resolver = PathResolver::for_manifest(manifest_path);
        let tested = manifest.dependencies.len();
        tracing::info!("testing {tested} dependencies");

        let mut available = 0;
        for (name, dependency) in &manifest.dependencies {
            let label = if dependency.summary.is_empty() {
                name.as_str()
            } else {
                dependency.summary.as_str()
            };
            match self.check(&resolver, name, dependency).await {
                Ok(()) => {
                    tracing::info!("\u{2705} available: {label}");
                    available += 1;
                }
                Err(e) if dependency.required || self.require_optional => {
                    tracing::warn!("\u{274C} unavailable: {label}: {e:#}");
                    if !self.continue_if_down {
                        break;
                    }
                }
                Err(e) => tracing::warn!("\u{26A0} unavailable: {label}: {e:#}"),
            }
        }
        TestSummary { tested, available }
    }

    /// Probe one dependency. Any 2xx response means available.
    pub async fn check(
        &self,
        resolver: &PathResolver,
        name: &str,
        dependency: &Dependency,
    ) -> anyhow::Result<()> {
        let Some(availability) = &dependency.availability else {
            anyhow::bail!("no availability URL or path");
        };
        if !availability.security.is_empty() {
            tracing::warn!(
                dependency = %name,
                "security configuration for availability endpoints is not supported"
            );
        }

        let url = if !availability.url.is_empty() {
            availability.url.clone()
        } else if !availability.path.is_empty() {
            let base = self.base_url(resolver, name, dependency).await?;
            availability_url(&base, &availability.path)
        } else {
            anyhow::bail!("no availability URL or path");
        };

        let response = self.client.get(&url).send().await.map_err(|e| {
            anyhow::anyhow!(
                "failed to reach availability URL [{url}]: {}",
                sanitize_reqwest_error(&e)
            )
        })?;
        let status = response.status();
        tracing::debug!(dependency = %name, %status, "checked availability");
        if !status.is_success() {
            anyhow::bail!("failed to reach availability URL [{url}]: {status}");
        }
        Ok(())
    }

    /// Server base URL: an override for `name`, else the first server in its spec.
    async fn base_url(
        &self,
        resolver: &PathResolver,
        name: &str,
        dependency: &Dependency,
    ) -> anyhow::Result<String> {
        if let Some(server) = self.servers.get(name) {
            tracing::debug!("determined server [{server}] from overrides");
            return Ok(server.clone());
        }

        let source = match resolver.resolve(name, &dependency.spec)? {
            Resolution::Located(source) => source,
            Resolution::Skipped { reason } => anyhow::bail!(reason),
        };
        let spec = PartialOpenApi::load(&self.fetcher, &source)
            .await
            .with_context(|| format!("failed to parse spec [{source}]"))?;

        let Some(first) = spec.servers.first() else {
            anyhow::bail!("no servers found in spec [{source}]");
        };
        if spec.servers.len() > 1 {
            tracing::warn!("more than 1 server found in spec [{source}] - using first");
        }
        tracing::debug!("determined server [{}] from openapi spec [{source}]", first.url);
        Ok(first.url.clone())
    }
}

pub async fn run(args: TestArgs) -> anyhow::Result<ExitCode> {
    let manifest_path = find_manifest(args.manifest.as_deref())?;
    tracing::debug!("reading opendeps manifest: {}", manifest_path.display());
    let manifest = Manifest::load(&manifest_path)?;

    let tester = AvailabilityTester::new(&args)?;
    let summary = tester.test_all(&manifest_path, &manifest).await;

    if summary.all_available() {
        tracing::info!("all {} dependencies are available", summary.tested);
        return Ok(ExitCode::SUCCESS);
    }
    tracing::info!(
        "{} of {} dependencies are available",
        summary.available,
        summary.tested
    );
    Ok(if args.non_zero_exit {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendeps_test_support::{Route, StaticServer, StatusCode};
    use tempfile::tempdir;

    fn args() -> TestArgs {
        TestArgs {
            manifest: None,
            non_zero_exit: false,
            continue_if_down: true,
            require_optional: false,
            servers: Vec::new(),
        }
    }

    fn write_manifest(dir: &Path, body: &str) -> (PathBuf, Manifest) {
        let path = dir.join("opendeps.yaml");
        std::fs::write(&path, body).expect("write manifest");
        let manifest = Manifest::load(&path).expect("load");
        (path, manifest)
    }

    #[test]
    fn availability_url_has_exactly_one_slash() {
        assert_eq!(
            availability_url("https://a.example.com/api/", "/health"),
            "https://a.example.com/api/health"
        );
        assert_eq!(
            availability_url("https://a.example.com", "health"),
            "https://a.example.com/health"
        );
    }

    #[test]
    fn server_override_parses() {
        assert_eq!(
            parse_server_override("pets=http://localhost:8080"),
            Ok(("pets".to_string(), "http://localhost:8080".to_string()))
        );
        assert!(parse_server_override("pets").is_err());
        assert!(parse_server_override("=http://x").is_err());
    }

    #[tokio::test]
    async fn base_url_comes_from_first_spec_server() {
        let server = StaticServer::start(vec![Route::ok("/system/status", "ok")])
            .await
            .expect("server");
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("pets.yaml"),
            format!(
                "openapi: 3.0.1\nservers:\n  - url: {}/\n  - url: http://unused.invalid\npaths: {{}}\n",
                server.base_url()
            ),
        )
        .expect("write spec");
        let (path, manifest) = write_manifest(
            dir.path(),
            "dependencies:\n  pets:\n    spec: ./pets.yaml\n    required: true\n    availability:\n      path: /system/status\n",
        );

        let summary = AvailabilityTester::new(&args())
            .expect("tester")
            .test_all(&path, &manifest)
            .await;
        assert_eq!(summary, TestSummary { tested: 1, available: 1 });
    }

    #[tokio::test]
    async fn server_override_wins_over_spec() {
        let server = StaticServer::start(vec![Route::ok("/health", "ok")])
            .await
            .expect("server");
        let dir = tempdir().expect("tempdir");
        let (path, manifest) = write_manifest(
            dir.path(),
            "dependencies:\n  pets:\n    spec: ./missing.yaml\n    availability:\n      path: health\n",
        );

        let tester = AvailabilityTester::new(&TestArgs {
            servers: vec![("pets".to_string(), server.base_url().to_string())],
            ..args()
        })
        .expect("tester");
        assert!(tester.test_all(&path, &manifest).await.all_available());
    }

    #[tokio::test]
    async fn failing_required_dependency_stops_without_continue() {
        let server = StaticServer::start(vec![Route::status(
            "/health",
            StatusCode::SERVICE_UNAVAILABLE,
        )])
        .await
        .expect("server");
        let dir = tempdir().expect("tempdir");
        let (path, manifest) = write_manifest(
            dir.path(),
            &format!(
                "dependencies:\n  a-down:\n    required: true\n    availability:\n      url: {down}\n  b-up:\n    availability:\n      url: {up}\n",
                down = server.url("/health"),
                up = server.url("/health"),
            ),
        );

        let tester = AvailabilityTester::new(&TestArgs {
            continue_if_down: false,
            ..args()
        })
        .expect("tester");
        let summary = tester.test_all(&path, &manifest).await;
        assert_eq!(summary, TestSummary { tested: 2, available: 0 });
        assert!(!summary.all_available());
    }

    #[tokio::test]
    async fn dependency_without_availability_is_unavailable() {
        let dir = tempdir().expect("tempdir");
        let (path, manifest) = write_manifest(
            dir.path(),
            "dependencies:\n  pets:\n    spec: ./pets.yaml\n",
        );
        let summary = AvailabilityTester::new(&args())
            .expect("tester")
            .test_all(&path, &manifest)
            .await;
        assert_eq!(summary, TestSummary { tested: 1, available: 0 });
    }
}
