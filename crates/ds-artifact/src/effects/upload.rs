use std::future::pending;
use std::io;
use std::time::Instant;

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use super::client::Inner;
use super::http::{HttpClient, UploadBody, UploadStream};
use crate::core::{ProgressThrottle, content_disposition, normalize_error_body};
use crate::data::request::UploadSource;
use crate::data::{Direction, Progress, TransferPhase, TransferRequest, UploadFile};
use crate::error::{Error, Result};

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub file_name: String,
    pub bytes:     u64,
}

/// Body stream for `file` that reports the running byte count on `sent`
/// each time the transport pulls a chunk.
async fn body_stream(
    file: &UploadFile,
    chunk_size: usize,
    sent: mpsc::UnboundedSender<u64>,
) -> Result<UploadStream> {
    let chunks: UploadStream = match &file.source {
        UploadSource::Path(path) => {
            let reader = tokio::fs::File::open(path).await?.take(file.size);
            Box::pin(ReaderStream::with_capacity(reader, chunk_size))
        }
        UploadSource::Memory(data) => {
            let pieces: Vec<io::Result<Bytes>> = (0..data.len())
                .step_by(chunk_size)
                .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
                .collect();
            Box::pin(stream::iter(pieces))
        }
    };

    let mut total = 0u64;
    Ok(Box::pin(chunks.map(move |chunk| {
        if let Ok(bytes) = &chunk {
            total += bytes.len() as u64;
            let _ = sent.send(total);
        }
        chunk
    })))
}

pub(crate) async fn run<C, F>(
    inner: &Inner<C>,
    request: &TransferRequest,
    file: UploadFile,
    token: &CancellationToken,
    emit: &mut F,
) -> Result<Uploaded>
where
    C: HttpClient,
    F: FnMut(Progress),
{
    request.validate()?;
    let url = inner.endpoint.artifact_url(request)?;
    let options = &inner.options;
    let total = file.size;
    tracing::debug!(%url, file = %file.name, total, "starting upload");

    let mut headers = options.headers.to_vec();
    headers.push(("content-type".into(), "application/octet-stream".into()));
    headers.push(("content-disposition".into(), content_disposition(&file.name)));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let stream = body_stream(&file, options.chunk_size.max(1), tx).await?;
    let body = UploadBody {
        stream,
        content_length: total,
    };

    let put = inner.transport.put(url.as_str(), &headers, body);
    tokio::pin!(put);

    let mut throttle = ProgressThrottle::new(options.progress_interval);
    let mut sent = 0u64;
    let mut last_activity = tokio::time::Instant::now();

    let response = loop {
        let deadline = options.stall_timeout.map(|d| (last_activity + d, d));
        let stalled = async move {
            match deadline {
                Some((at, limit)) => {
                    tokio::time::sleep_until(at).await;
                    limit
                }
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            Some(n) = rx.recv() => {
                sent = n;
                last_activity = tokio::time::Instant::now();
                if n < total && throttle.ready(Instant::now()) {
                    tracing::trace!(sent = n, total, "upload progress");
                    emit(Progress {
                        direction:         Direction::Upload,
                        phase:             TransferPhase::Transferring,
                        bytes_transferred: n,
                        total_bytes:       Some(total),
                    });
                }
            }
            result = &mut put => break result.map_err(Error::network)?,
            limit = stalled => return Err(Error::Timeout(limit)),
        }
    };

    // Counts the transport pulled right before finishing.
    while let Ok(n) = rx.try_recv() {
        sent = n;
    }

    if response.head.status == 404 {
        return Err(Error::NotFound);
    }
    if !response.head.is_success() {
        let status = response.head.status;
        let body = &response.body[..response.body.len().min(options.max_error_body)];
        return Err(Error::Status {
            status,
            message: normalize_error_body(status, body),
        });
    }
    if sent != total {
        return Err(Error::LengthMismatch {
            expected: total,
            actual:   sent,
        });
    }
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    emit(Progress {
        direction:         Direction::Upload,
        phase:             TransferPhase::Completed,
        bytes_transferred: total,
        total_bytes:       Some(total),
    });
    tracing::debug!(bytes = total, "upload complete");

    Ok(Uploaded {
        file_name: file.name,
        bytes:     total,
    })
}
