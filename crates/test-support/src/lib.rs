use anyhow::Context as _;
use axum::Router;
use axum::routing::get;
use std::net::TcpListener;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub use axum::http::StatusCode;

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails or if the bound socket's
/// local address cannot be read.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status (2xx/3xx).
///
/// # Errors
///
/// Returns an error if the timeout elapses before the endpoint returns a success status.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}

/// A canned response served by [`StaticServer`].
#[derive(Debug, Clone)]
pub struct Route {
    pub path: String,
    pub status: StatusCode,
    pub body: String,
}

impl Route {
    #[must_use]
    pub fn ok(path: &str, body: &str) -> Self {
        Self {
            path: path.to_string(),
            status: StatusCode::OK,
            body: body.to_string(),
        }
    }

    #[must_use]
    pub fn status(path: &str, status: StatusCode) -> Self {
        Self {
            path: path.to_string(),
            status,
            body: String::new(),
        }
    }
}

/// In-process HTTP server answering `GET` requests with fixed bodies.
///
/// Shuts down gracefully when dropped.
pub struct StaticServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    _handle: JoinHandle<()>,
}

impl StaticServer {
    /// Bind `127.0.0.1:0` and serve `routes` until the server is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(routes: Vec<Route>) -> anyhow::Result<Self> {
        let mut app = Router::new();
        for route in routes {
            let Route { path, status, body } = route;
            app = app.route(
                &path,
                get(move || {
                    let body = body.clone();
                    async move { (status, body) }
                }),
            );
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind static server")?;
        let addr = listener.local_addr().context("local_addr")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown_tx),
            _handle: handle,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
