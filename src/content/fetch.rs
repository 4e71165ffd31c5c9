use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Largest image accepted by [`HttpImageFetcher::new`] (20MB).
const MAX_IMAGE_SIZE: u64 = 20 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while downloading an attachment.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, timeout)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Only http and https sources are downloaded
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(u64),
    /// Writing the destination file failed
    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads a single image to a local path.
pub trait ImageFetcher {
    /// Fetches `url` into `destination`, returning the number of bytes written.
    fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, FetchError>;
}

/// Blocking HTTP fetcher.
///
/// Bodies are streamed into a `.part` file next to the destination and renamed
/// into place once complete, so an interrupted download never leaves a
/// truncated image under the final name.
pub struct HttpImageFetcher {
    client: reqwest::blocking::Client,
    max_size: u64,
}

impl HttpImageFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("wxr2md/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, MAX_IMAGE_SIZE))
    }

    pub fn with_client(client: reqwest::blocking::Client, max_size: u64) -> Self {
        Self { client, max_size }
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, url: &Url, destination: &Path) -> Result<u64, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        let response = self.client.get(url.clone()).send()?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        // Fast path: check Content-Length header
        if let Some(len) = response.content_length() {
            if len > self.max_size {
                return Err(FetchError::ResponseTooLarge(self.max_size));
            }
        }

        let temp_path = part_path(destination);
        let result = write_limited(response, &temp_path, self.max_size);
        let written = match result {
            Ok(written) => written,
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        if let Err(e) = std::fs::rename(&temp_path, destination) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }

        tracing::debug!(url = %url, path = %destination.display(), bytes = written, "Image saved");
        Ok(written)
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

fn write_limited(
    response: reqwest::blocking::Response,
    path: &Path,
    limit: u64,
) -> Result<u64, FetchError> {
    let mut file = std::fs::File::create(path)?;
    // One byte past the limit is enough to tell an oversized body apart.
    let mut body = response.take(limit.saturating_add(1));
    let written = std::io::copy(&mut body, &mut file)?;
    if written > limit {
        return Err(FetchError::ResponseTooLarge(limit));
    }
    file.sync_all()?;
    Ok(written)
}
