use std::{io, path::Path, time::Duration};

use futures_util::StreamExt;
use jmod_cancel::CancelToken;
use jmod_network::ThrottledClient;
use jmod_tarball::{constant_time_eq, ChecksumFormat, Hasher};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::{tarball_cache, CacheError};

/// End-to-end deadline from request start to EOF.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Progress is emitted every 100 KiB and at EOF.
const PROGRESS_STEP: u64 = 100 * 1024;

pub struct DownloadRequest<'a> {
    pub cancel: &'a CancelToken,
    pub http: &'a ThrottledClient,
    pub tarball_root: &'a Path,
    pub url: &'a str,
    pub format: ChecksumFormat,
    pub dest_dir: &'a Path,
    pub status_key: &'a str,
    pub name: &'a str,
    pub version: &'a str,
}

pub struct DownloadedArchive {
    /// Temporary `.download-*.tmp` file, removed on drop.
    pub file: NamedTempFile,
    /// Digest computed over the archive bytes.
    pub checksum: Vec<u8>,
    /// Whether the bytes came from the secondary tarball cache.
    pub reused_cache: bool,
}

/// Fetch the archive into a temp file in `dest_dir`, hashing it exactly once
/// on the way through. Consults the secondary tarball cache first; a cached
/// file is re-hashed in full before being trusted.
pub async fn download_to_temp_with_checksum(
    request: DownloadRequest<'_>,
) -> Result<DownloadedArchive, CacheError> {
    let DownloadRequest { cancel, http, tarball_root, url, format, dest_dir, status_key, name, version } =
        request;

    if let Some((cached_file, cached_sum)) = tarball_cache::lookup(tarball_root, url, format) {
        jmod_status::set_text(status_key, format!("using cached {name}@{version}"));
        let reused = {
            let dest_dir = dest_dir.to_path_buf();
            tokio::task::spawn_blocking(move || {
                reuse_cached_tarball(&cached_file, &cached_sum, format, &dest_dir)
            })
            .await
            .map_err(|join_error| CacheError::Io(io::Error::other(join_error)))?
        };
        if let Some(archive) = reused {
            return Ok(archive);
        }
        // stale or unreadable cache entry, fall through to the network
    }

    let label = format!("downloading {name}@{version}");

    let send = http.run_with_permit(|client| {
        client.get(url).header("user-agent", "jmod").timeout(DOWNLOAD_TIMEOUT).send()
    });
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(CacheError::Cancelled),
        response = send => response.map_err(middleware_error)?,
    };
    if response.status() != reqwest::StatusCode::OK {
        return Err(CacheError::BadStatus { status: response.status(), url: url.to_string() });
    }

    let total = response.content_length();
    match total {
        Some(total) => jmod_status::set_progress(status_key, label.as_str(), 0, total),
        None => jmod_status::set_text(status_key, label.as_str()),
    }

    let file =
        tempfile::Builder::new().prefix(".download-").suffix(".tmp").tempfile_in(dest_dir)?;
    let mut out = tokio::fs::File::from_std(file.reopen()?);

    let mut hasher = Hasher::new(format);
    let mut stream = response.bytes_stream();
    let mut current: u64 = 0;
    let mut last_emitted: u64 = 0;

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(CacheError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };
        let chunk = chunk.map_err(body_error)?;
        hasher.update(&chunk);
        out.write_all(&chunk).await?;
        current += chunk.len() as u64;
        if current - last_emitted >= PROGRESS_STEP {
            last_emitted = current;
            if let Some(total) = total {
                jmod_status::set_progress(status_key, label.as_str(), current, total);
            }
        }
    }
    if let Some(total) = total {
        jmod_status::set_progress(status_key, label.as_str(), current, total);
    }

    // Flush before the digest is compared.
    out.sync_all().await?;
    drop(out);

    Ok(DownloadedArchive { file, checksum: hasher.finalize(), reused_cache: false })
}

/// Recompute the digest of a cached tarball; on a match, copy it into a
/// fresh temp file for the caller. Any failure falls back to downloading.
fn reuse_cached_tarball(
    cached_file: &Path,
    cached_sum: &[u8],
    format: ChecksumFormat,
    dest_dir: &Path,
) -> Option<DownloadedArchive> {
    use std::io::Read;

    let mut source = std::fs::File::open(cached_file).ok()?;
    let mut hasher = Hasher::new(format);
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = source.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    let computed = hasher.finalize();
    if !constant_time_eq(&computed, cached_sum) {
        return None;
    }

    let file =
        tempfile::Builder::new().prefix(".download-").suffix(".tmp").tempfile_in(dest_dir).ok()?;
    std::fs::copy(cached_file, file.path()).ok()?;
    Some(DownloadedArchive { file, checksum: computed, reused_cache: true })
}

fn middleware_error(error: reqwest_middleware::Error) -> CacheError {
    match error {
        reqwest_middleware::Error::Reqwest(error) => body_error(error),
        other => CacheError::NetworkMiddleware(other),
    }
}

fn body_error(error: reqwest::Error) -> CacheError {
    if error.is_timeout() {
        CacheError::Timeout
    } else {
        CacheError::Network(error)
    }
}
