//! In-memory [`ContainerRuntime`] for tests.

use super::{ContainerRuntime, ContainerSpec, LogChunk, LogStream};
use crate::error::{MockError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) const FAKE_CONTAINER_ID: &str = "fake-container-1";

/// Records calls; its log stream stays open until the container is stopped.
#[derive(Debug)]
pub(crate) struct FakeRuntime {
    image_present: bool,
    fail_start: bool,
    /// Accept stop requests but keep reporting the container as running.
    ignore_stop: bool,
    start_delay: Duration,
    pub stops: AtomicUsize,
    pub removed: AtomicUsize,
    pub created: Mutex<Option<ContainerSpec>>,
    running: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
    log_tx: Mutex<Option<mpsc::UnboundedSender<Result<LogChunk>>>>,
    log_rx: Mutex<Option<mpsc::UnboundedReceiver<Result<LogChunk>>>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            image_present: false,
            fail_start: false,
            ignore_stop: false,
            start_delay: Duration::ZERO,
            stops: AtomicUsize::new(0),
            removed: AtomicUsize::new(0),
            created: Mutex::new(None),
            running: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            log_tx: Mutex::new(Some(tx)),
            log_rx: Mutex::new(Some(rx)),
        }
    }
}

impl FakeRuntime {
    pub(crate) fn with_image_present(self) -> Self {
        Self {
            image_present: true,
            ..self
        }
    }

    pub(crate) fn with_failing_start(self) -> Self {
        Self {
            fail_start: true,
            ..self
        }
    }

    pub(crate) fn with_ignored_stop(self) -> Self {
        Self {
            ignore_stop: true,
            ..self
        }
    }

    /// Make `start_container` take `delay` before it completes.
    pub(crate) fn with_start_delay(self, delay: Duration) -> Self {
        Self {
            start_delay: delay,
            ..self
        }
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    fn emit(&self, chunk: LogChunk) {
        if let Some(tx) = self.log_tx.lock().as_ref() {
            let _ = tx.send(Ok(chunk));
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn image_exists(&self, _image: &str) -> Result<bool> {
        self.record("image_exists");
        Ok(self.image_present)
    }

    async fn pull_image(&self, _repository: &str, _tag: &str) -> Result<()> {
        self.record("pull");
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        self.record("create");
        *self.created.lock() = Some(spec.clone());
        Ok(FAKE_CONTAINER_ID.to_string())
    }

    async fn start_container(&self, _id: &str) -> Result<()> {
        self.record("start");
        if !self.start_delay.is_zero() {
            tokio::time::sleep(self.start_delay).await;
        }
        if self.fail_start {
            return Err(MockError::engine("start container", "port is already allocated"));
        }
        self.running.store(true, Ordering::SeqCst);
        self.emit(LogChunk::Stdout(Bytes::from_static(b"imposter started\n")));
        Ok(())
    }

    async fn stop_container(&self, _id: &str, _timeout: Duration) -> Result<()> {
        self.record("stop");
        self.stops.fetch_add(1, Ordering::SeqCst);
        if !self.ignore_stop {
            self.running.store(false, Ordering::SeqCst);
            self.log_tx.lock().take();
        }
        Ok(())
    }

    async fn is_running(&self, _id: &str) -> Result<bool> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    async fn remove_container(&self, _id: &str) -> Result<()> {
        self.record("remove");
        self.removed.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.log_tx.lock().take();
        Ok(())
    }

    fn logs(&self, _id: &str) -> LogStream {
        let Some(rx) = self.log_rx.lock().take() else {
            return Box::pin(futures::stream::empty());
        };
        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        }))
    }
}
