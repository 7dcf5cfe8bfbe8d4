use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::client::{Inner, read_error_body};
use super::guarded;
use super::http::{BoxStream, HttpClient};
use crate::core::{ProgressThrottle, normalize_error_body, parse_metadata};
use crate::data::{
    ArtifactMetadata, Direction, DownloadTarget, Progress, TransferPhase, TransferRequest,
};
use crate::error::{Error, Result};

/// Where a finished download landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadLocation {
    File(PathBuf),
    Memory(Bytes),
}

/// Result of a successful download.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub metadata: ArtifactMetadata,
    pub bytes:    u64,
    pub location: DownloadLocation,
}

/// Destination being filled while the body streams in.
enum Sink {
    /// Staged next to the destination and renamed over it on success.
    /// Dropping the staging file removes it.
    File {
        staging:     NamedTempFile,
        file:        tokio::fs::File,
        destination: PathBuf,
    },
    Memory(BytesMut),
}

impl Sink {
    async fn open(target: DownloadTarget, metadata: &ArtifactMetadata) -> Result<Self> {
        let path = match target {
            DownloadTarget::Memory => {
                let capacity = metadata.size.unwrap_or(0).min(64 * 1024 * 1024) as usize;
                return Ok(Sink::Memory(BytesMut::with_capacity(capacity)));
            }
            DownloadTarget::File(path) => path,
        };

        let destination = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => path.join(&metadata.file_name),
            _ => path,
        };
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await?;

        let staging = tempfile::Builder::new()
            .prefix(".ds-artifact-")
            .suffix(".part")
            .tempfile_in(&parent)?;
        let file = tokio::fs::File::from_std(staging.reopen()?);
        Ok(Sink::File {
            staging,
            file,
            destination,
        })
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        match self {
            Sink::File { file, .. } => file.write_all(chunk).await?,
            Sink::Memory(buf) => buf.extend_from_slice(chunk),
        }
        Ok(())
    }

    /// Drop a partial download.
    fn discard(self) {
        if let Sink::File { staging, file, .. } = self {
            drop(file);
            remove_staging(staging);
        }
    }

    /// Flush the staged file and move it over the destination. Nothing is
    /// placed once the token fires.
    async fn finish(self, token: &CancellationToken) -> Result<DownloadLocation> {
        match self {
            Sink::File {
                staging,
                mut file,
                destination,
            } => {
                let synced = guarded(token, None, async {
                    file.flush().await?;
                    file.sync_all().await
                })
                .await;
                drop(file);

                let synced = match synced {
                    Ok(Ok(())) if token.is_cancelled() => Err(Error::Cancelled),
                    Ok(res) => res.map_err(Error::Io),
                    Err(err) => Err(err),
                };
                if let Err(err) = synced {
                    remove_staging(staging);
                    return Err(err);
                }
                persist(staging, &destination)?;
                Ok(DownloadLocation::File(destination))
            }
            Sink::Memory(_) if token.is_cancelled() => Err(Error::Cancelled),
            Sink::Memory(buf) => Ok(DownloadLocation::Memory(buf.freeze())),
        }
    }
}

fn remove_staging(staging: NamedTempFile) {
    let path = staging.path().to_path_buf();
    if let Err(err) = staging.close() {
        tracing::warn!(path = %path.display(), %err, "failed to remove staging file");
    }
}

fn persist(staging: NamedTempFile, destination: &Path) -> Result<()> {
    staging
        .persist(destination)
        .map(|_| ())
        .map_err(|e| Error::Io(e.error))
}

pub(crate) async fn run<C, F>(
    inner: &Inner<C>,
    request: &TransferRequest,
    target: DownloadTarget,
    token: &CancellationToken,
    emit: &mut F,
) -> Result<Downloaded>
where
    C: HttpClient,
    F: FnMut(Progress),
{
    request.validate()?;
    let url = inner.endpoint.artifact_url(request)?;
    let options = &inner.options;
    tracing::debug!(%url, "starting download");

    let response = guarded(
        token,
        options.stall_timeout,
        inner.transport.get(url.as_str(), &options.headers),
    )
    .await?
    .map_err(Error::network)?;

    if response.head.status == 404 {
        return Err(Error::NotFound);
    }
    if !response.head.is_success() {
        let status = response.head.status;
        let body = read_error_body(response.body, options.max_error_body, token, options).await?;
        return Err(Error::Status {
            status,
            message: normalize_error_body(status, &body),
        });
    }

    let metadata = parse_metadata(&response.head.headers, &request.resource_id);
    let total = metadata.size;
    let mut sink = Sink::open(target, &metadata).await?;

    let received = match fill(&mut sink, response.body, total, token, inner, emit).await {
        Ok(received) => received,
        Err(err) => {
            sink.discard();
            return Err(err);
        }
    };

    let location = sink.finish(token).await?;
    // An abort racing the rename still settles as cancelled. The placed file
    // is complete, so it stays.
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    emit(Progress {
        direction:         Direction::Download,
        phase:             TransferPhase::Completed,
        bytes_transferred: received,
        total_bytes:       total,
    });
    tracing::debug!(bytes = received, "download complete");

    Ok(Downloaded {
        metadata,
        bytes: received,
        location,
    })
}

/// Stream the body into `sink`, returning the byte count once it matches
/// the advertised length.
async fn fill<C, F>(
    sink: &mut Sink,
    mut body: BoxStream<'static, std::result::Result<Bytes, C::Error>>,
    total: Option<u64>,
    token: &CancellationToken,
    inner: &Inner<C>,
    emit: &mut F,
) -> Result<u64>
where
    C: HttpClient,
    F: FnMut(Progress),
{
    let options = &inner.options;
    let mut throttle = ProgressThrottle::new(options.progress_interval);
    let mut received = 0u64;

    while let Some(chunk) = guarded(token, options.stall_timeout, body.next()).await? {
        let chunk = chunk.map_err(Error::network)?;
        received += chunk.len() as u64;
        if let Some(expected) = total
            && received > expected
        {
            return Err(Error::LengthMismatch {
                expected,
                actual: received,
            });
        }

        sink.write(&chunk).await?;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // The final byte count is reported by the terminal event alone.
        let unfinished = total.is_none_or(|t| received < t);
        if unfinished && throttle.ready(Instant::now()) {
            tracing::trace!(received, ?total, "download progress");
            emit(Progress {
                direction:         Direction::Download,
                phase:             TransferPhase::Transferring,
                bytes_transferred: received,
                total_bytes:       total,
            });
        }
    }

    if let Some(expected) = total
        && received != expected
    {
        return Err(Error::LengthMismatch {
            expected,
            actual: received,
        });
    }
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(received)
}
