// chef-net/src/http.rs
use std::path::Path;
use std::time::Duration;

use chef_common::error::{ChefError, Result};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "chef package manager (Rust)";

pub fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(ChefError::from)
}

/// Fetches a URL as text, e.g. a release API answering with the latest version.
pub async fn fetch_text(client: &Client, url: &str, cancel: &CancellationToken) -> Result<String> {
    debug!("Fetching text from {}", url);
    let request = async {
        let response = client.get(url).send().await?.error_for_status()?;
        response.text().await.map_err(ChefError::from)
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChefError::Cancelled),
        res = request => res,
    }
}

/// Streams `url` into `dest`, reporting `(bytes_loaded, bytes_total)` after each
/// chunk. Cancellation is observed between chunks; a partial file is removed.
pub async fn download_file<P>(
    client: &Client,
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
    mut on_progress: P,
) -> Result<u64>
where
    P: FnMut(u64, Option<u64>) + Send,
{
    debug!("Downloading {} to {}", url, dest.display());
    let result = stream_to_file(client, url, dest, cancel, &mut on_progress).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(dest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("Failed to remove partial download {}: {}", dest.display(), e);
            }
        }
    }
    result
}

async fn stream_to_file<P>(
    client: &Client,
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
    on_progress: &mut P,
) -> Result<u64>
where
    P: FnMut(u64, Option<u64>) + Send,
{
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ChefError::Cancelled),
        res = client.get(url).send() => res?,
    };
    let status = response.status();
    if !status.is_success() {
        error!("Download of {} failed with HTTP status {}", url, status);
        return Err(ChefError::HttpDownload(
            url.to_string(),
            format!("HTTP status {status}"),
        ));
    }

    let total = response.content_length();
    let mut file = TokioFile::create(dest).await?;
    let mut loaded: u64 = 0;
    let mut stream = response.bytes_stream();
    on_progress(0, total);

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChefError::Cancelled),
            chunk = stream.next() => chunk,
        };
        match chunk {
            Some(Ok(bytes)) => {
                file.write_all(&bytes).await?;
                loaded += bytes.len() as u64;
                on_progress(loaded, total);
            }
            Some(Err(e)) => {
                return Err(ChefError::HttpDownload(url.to_string(), e.to_string()));
            }
            None => break,
        }
    }
    file.flush().await?;
    debug!("Downloaded {} bytes from {}", loaded, url);
    Ok(loaded)
}
