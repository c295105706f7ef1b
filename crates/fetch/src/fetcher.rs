//! Reading content from any [`SourceLocation`].

use crate::error::{FetchError, Result};
use crate::redact::{redact_url, sanitize_reqwest_error};
use crate::source::SourceLocation;
use futures::TryStreamExt as _;
use reqwest::Client;
use std::path::Path;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWriteExt as _};
use tokio_util::io::StreamReader;
use url::Url;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// A readable byte stream over fetched content. Dropping it releases the file or connection.
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Clone, Default)]
pub struct ContentFetcher {
    client: Client,
}

impl ContentFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Open a byte stream for `source`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] or [`FetchError::Status`] for HTTP sources that fail or
    /// answer with a non-2xx status, and [`FetchError::Open`] if a local file cannot be opened.
    pub async fn open(&self, source: &SourceLocation) -> Result<ContentStream> {
        match source {
            SourceLocation::Http(url) => self.open_http(url).await,
            SourceLocation::LocalFile(path) | SourceLocation::LocalFileUri(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|e| FetchError::Open {
                        path: path.clone(),
                        source: e,
                    })?;
                Ok(Box::pin(file))
            }
        }
    }

    async fn open_http(&self, url: &Url) -> Result<ContentStream> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: redact_url(url),
                message: sanitize_reqwest_error(&e),
            })?;

        let status = resp.status();
        tracing::debug!(url = %redact_url(url), %status, "fetched");
        if !status.is_success() {
            return Err(FetchError::Status {
                url: redact_url(url),
                status,
            });
        }

        let body = resp.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(body)))
    }

    /// Read the whole content of `source` into memory.
    ///
    /// # Errors
    ///
    /// Returns any error from [`ContentFetcher::open`], or [`FetchError::Read`] if the stream
    /// fails part-way.
    pub async fn read_to_bytes(&self, source: &SourceLocation) -> Result<Vec<u8>> {
        let mut reader = self.open(source).await?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| FetchError::Read {
                location: source.to_string(),
                source: e,
            })?;
        Ok(buf)
    }

    /// Read the whole content of `source` as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Same as [`ContentFetcher::read_to_bytes`]; invalid UTF-8 is reported as
    /// [`FetchError::Read`].
    pub async fn read_to_string(&self, source: &SourceLocation) -> Result<String> {
        let bytes = self.read_to_bytes(source).await?;
        String::from_utf8(bytes).map_err(|e| FetchError::Read {
            location: source.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }

    /// Copy the content of `source` into `dest`, creating or truncating it.
    ///
    /// The source is opened before `dest` is touched, so a failed fetch never leaves an empty
    /// destination file behind. The destination is flushed and synced before returning.
    ///
    /// # Errors
    ///
    /// Returns any error from [`ContentFetcher::open`], [`FetchError::Read`] if the source
    /// stream fails part-way, or [`FetchError::Write`] carrying `dest` if creating, writing or
    /// syncing the destination fails.
    pub async fn copy_to(&self, source: &SourceLocation, dest: &Path) -> Result<u64> {
        tracing::info!("copying from {source}");
        tracing::trace!(dest = %dest.display(), "copying from {source}");

        let mut reader = self.open(source).await?;
        let write_err = |e: std::io::Error| FetchError::Write {
            path: dest.to_path_buf(),
            source: e,
        };

        let read_err = |e: std::io::Error| FetchError::Read {
            location: source.to_string(),
            source: e,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(write_err)?;
        let mut buf = vec![0u8; COPY_BUF_SIZE];
        let mut copied = 0u64;
        loop {
            let n = reader.read(&mut buf).await.map_err(read_err)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await.map_err(write_err)?;
            copied += n as u64;
        }
        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        Ok(copied)
    }
}
