use futures_util::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::error::ForgeError;
use crate::utils::now_millis;

pub fn download_file_name(millis: i64) -> String {
    format!("monster-{millis}.png")
}

/// Streams the image at `url` into `dir` as `monster-<epoch millis>.png`.
pub async fn download_image(
    http: &reqwest::Client,
    url: &str,
    dir: &Path,
) -> Result<PathBuf, ForgeError> {
    let result = fetch_to_file(http, url, dir).await;
    if let Err(e) = &result {
        error!(error = %e, %url, "download failed");
    }
    result
}

async fn fetch_to_file(
    http: &reqwest::Client,
    url: &str,
    dir: &Path,
) -> Result<PathBuf, ForgeError> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| ForgeError::Download(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(ForgeError::Download(format!(
            "network response not OK: HTTP {}",
            resp.status()
        )));
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ForgeError::Download(format!("create {}: {e}", dir.display())))?;
    let path = dir.join(download_file_name(now_millis()));
    let file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| ForgeError::Download(format!("create {}: {e}", path.display())))?;

    let written = save_stream(&path, file, resp.bytes_stream()).await?;
    info!(path = %path.display(), bytes = written, "image downloaded");
    Ok(path)
}

/// Writes every chunk of `stream` to `out`, removing `path` if anything fails
/// so no truncated image is left behind.
async fn save_stream<W, S, B, E>(path: &Path, out: W, stream: S) -> Result<usize, ForgeError>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let result = write_body(out, stream).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(path).await;
    }
    result
}

async fn write_body<W, S, B, E>(mut out: W, stream: S) -> Result<usize, ForgeError>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| ForgeError::Download(format!("stream error: {e}")))?;
        let bytes = bytes.as_ref();
        out.write_all(bytes)
            .await
            .map_err(|e| ForgeError::Download(format!("write: {e}")))?;
        written += bytes.len();
    }
    out.flush()
        .await
        .map_err(|e| ForgeError::Download(format!("flush: {e}")))?;
    Ok(written)
}
