use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::download::{self, Downloaded};
use super::handle::TransferHandle;
use super::http::{BoxStream, HttpClient};
use super::upload::{self, Uploaded};
use super::guarded;
use crate::core::{Endpoint, normalize_error_body, parse_metadata};
use crate::data::{
    ArtifactMetadata, DownloadTarget, Progress, TransferOptions, TransferOutcome, TransferRequest,
    UploadFile,
};
use crate::error::{Error, NormalizedError, Result};

pub(crate) struct Inner<C> {
    pub(crate) transport: C,
    pub(crate) endpoint:  Endpoint,
    pub(crate) options:   TransferOptions,
}

/// Uploads, downloads and inspects artifacts against one endpoint.
///
/// A client runs one transfer at a time. Each transfer gets its own
/// cancellation token; [`abort_inprogress_requests`] cancels the current
/// one without affecting transfers started afterwards.
///
/// Cloning is cheap and clones share the in-flight slot.
///
/// [`abort_inprogress_requests`]: ArtifactClient::abort_inprogress_requests
pub struct ArtifactClient<C> {
    inner: Arc<Inner<C>>,
    slot:  Arc<Mutex<Slot>>,
}

impl<C> Clone for ArtifactClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            slot:  Arc::clone(&self.slot),
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    active:  Option<Active>,
    aborted: bool,
    next_id: u64,
}

#[derive(Debug)]
struct Active {
    id:    u64,
    token: CancellationToken,
}

/// Ownership of the client's in-flight slot for one transfer.
///
/// Dropping it frees the slot, unless a newer transfer already took it.
struct Lease {
    id:    u64,
    token: CancellationToken,
    slot:  Arc<Mutex<Slot>>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.active.as_ref().is_some_and(|a| a.id == self.id) {
            slot.active = None;
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder resolving which endpoint a client talks to.
pub struct ArtifactClientBuilder<C> {
    transport:         C,
    default_endpoint:  Option<String>,
    endpoint_override: Option<String>,
    options:           TransferOptions,
}

impl<C: HttpClient> ArtifactClientBuilder<C> {
    /// The production endpoint used when no override applies.
    #[must_use]
    pub fn default_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.default_endpoint = Some(endpoint.into());
        self
    }

    /// A non-production override, typically from
    /// [`resolve_from_env`](crate::core::resolve_from_env).
    #[must_use]
    pub fn endpoint_override(mut self, endpoint: Option<String>) -> Self {
        self.endpoint_override = endpoint;
        self
    }

    #[must_use]
    pub fn options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<ArtifactClient<C>> {
        let chosen = self
            .endpoint_override
            .filter(|e| !e.trim().is_empty())
            .or(self.default_endpoint)
            .ok_or_else(|| Error::InvalidEndpoint("no endpoint configured".into()))?;
        let endpoint = Endpoint::parse(&chosen)?;
        tracing::debug!(%endpoint, "artifact client ready");
        Ok(ArtifactClient::new(self.transport, endpoint, self.options))
    }
}

impl<C: HttpClient> ArtifactClient<C> {
    pub fn new(transport: C, endpoint: Endpoint, options: TransferOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                endpoint,
                options,
            }),
            slot:  Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn builder(transport: C) -> ArtifactClientBuilder<C> {
        ArtifactClientBuilder {
            transport,
            default_endpoint: None,
            endpoint_override: None,
            options: TransferOptions::default(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint { &self.inner.endpoint }

    pub fn options(&self) -> &TransferOptions { &self.inner.options }

    /// Clear the aborted latch left by [`abort_inprogress_requests`] and
    /// release a cancelled transfer's slot that has not settled yet.
    ///
    /// [`abort_inprogress_requests`]: ArtifactClient::abort_inprogress_requests
    pub fn allow_requests(&self) {
        let mut slot = lock(&self.slot);
        slot.aborted = false;
        if slot.active.as_ref().is_some_and(|a| a.token.is_cancelled()) {
            slot.active = None;
        }
    }

    /// Cancel the transfer currently in flight on this client, if any.
    ///
    /// The transfer settles as [`Error::Cancelled`] at its next await point.
    pub fn abort_inprogress_requests(&self) {
        let mut slot = lock(&self.slot);
        slot.aborted = true;
        if let Some(active) = &slot.active {
            tracing::debug!(transfer = active.id, "aborting in-flight transfer");
            active.token.cancel();
        }
    }

    /// Whether an abort was requested since the last [`allow_requests`].
    ///
    /// [`allow_requests`]: ArtifactClient::allow_requests
    pub fn is_aborted(&self) -> bool { lock(&self.slot).aborted }

    /// Whether a transfer that has not been aborted is in flight.
    pub fn is_busy(&self) -> bool {
        lock(&self.slot)
            .active
            .as_ref()
            .is_some_and(|a| !a.token.is_cancelled())
    }

    fn begin(&self) -> Result<Lease> {
        let mut slot = lock(&self.slot);
        if slot.active.as_ref().is_some_and(|a| !a.token.is_cancelled()) {
            return Err(Error::Busy);
        }
        slot.next_id += 1;
        let id = slot.next_id;
        let token = CancellationToken::new();
        slot.active = Some(Active {
            id,
            token: token.clone(),
        });
        Ok(Lease {
            id,
            token,
            slot: Arc::clone(&self.slot),
        })
    }

    /// Check an artifact's existence, file name and size without
    /// downloading it.
    #[tracing::instrument(skip_all, level = "debug", name = "head-artifact", fields(
        resource = %request.resource_type,
        id = %request.resource_id,
    ))]
    pub async fn head_artifact(&self, request: &TransferRequest) -> Result<ArtifactMetadata> {
        request.validate()?;
        let url = self.inner.endpoint.artifact_url(request)?;
        let options = &self.inner.options;

        let head = guarded(
            &CancellationToken::new(),
            options.stall_timeout,
            self.inner.transport.head(url.as_str(), &options.headers),
        )
        .await?
        .map_err(Error::network)?;

        if head.status == 404 {
            return Err(Error::NotFound);
        }
        if !head.is_success() {
            // HEAD responses carry no body to extract a message from.
            return Err(Error::Status {
                status:  head.status,
                message: normalize_error_body(head.status, &[]),
            });
        }

        let metadata = parse_metadata(&head.headers, &request.resource_id);
        tracing::debug!(file = %metadata.file_name, size = ?metadata.size, "artifact metadata");
        Ok(metadata)
    }

    /// Download in the caller's task, reporting progress through
    /// `progress_handler`.
    ///
    /// The handler sees non-decreasing byte counts and, on success, one
    /// final [`Completed`](crate::TransferPhase::Completed) event.
    #[tracing::instrument(skip_all, level = "debug", name = "get-artifact", fields(
        resource = %request.resource_type,
        id = %request.resource_id,
    ))]
    pub async fn get_artifact(
        &self,
        request: &TransferRequest,
        target: DownloadTarget,
        mut progress_handler: impl FnMut(Progress) + Send,
    ) -> Result<Downloaded> {
        let lease = self.begin()?;
        download::run(&self.inner, request, target, &lease.token, &mut progress_handler).await
    }

    /// Start a download in the background and return a handle to observe
    /// or cancel it.
    pub fn download(
        &self,
        request: TransferRequest,
        target: DownloadTarget,
    ) -> Result<TransferHandle<Downloaded>>
    where
        C: 'static,
    {
        let lease = self.begin()?;
        let token = lease.token.clone();
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = mpsc::unbounded_channel();
        let span = tracing::debug_span!("download", transfer = lease.id);

        let task = tokio::spawn(
            async move {
                // Held until the transfer settles.
                let lease = lease;
                let mut emit = |p: Progress| {
                    let _ = tx.send(p);
                };
                download::run(&inner, &request, target, &lease.token, &mut emit).await
            }
            .instrument(span),
        );
        Ok(TransferHandle::new(rx, task, token))
    }

    /// Upload in the caller's task with callback-style reporting.
    ///
    /// `progress_callback` receives whole percentages of `file.size()`.
    /// Failures reach `on_error` already normalized; a cancelled upload
    /// calls neither `on_error` nor `on_success`.
    #[tracing::instrument(skip_all, level = "debug", name = "create-artifact", fields(
        resource = %request.resource_type,
        id = %request.resource_id,
        file = %file.name(),
    ))]
    pub async fn create_artifact(
        &self,
        request: &TransferRequest,
        file: UploadFile,
        mut progress_callback: impl FnMut(u8) + Send,
        on_error: impl FnOnce(NormalizedError),
        on_success: impl FnOnce(),
    ) -> TransferOutcome {
        let result = match self.begin() {
            Ok(lease) => {
                let mut emit = |p: Progress| {
                    if let Some(pct) = p.percentage() {
                        progress_callback(pct);
                    }
                };
                upload::run(&self.inner, request, file, &lease.token, &mut emit).await
            }
            Err(err) => Err(err),
        };

        let outcome = TransferOutcome::from_result(&result);
        match result {
            Ok(_) => on_success(),
            Err(err) if err.is_cancelled() => {}
            Err(err) => on_error(err.normalize()),
        }
        outcome
    }

    /// Start an upload in the background and return a handle to observe or
    /// cancel it.
    pub fn upload(&self, request: TransferRequest, file: UploadFile) -> Result<TransferHandle<Uploaded>>
    where
        C: 'static,
    {
        let lease = self.begin()?;
        let token = lease.token.clone();
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = mpsc::unbounded_channel();
        let span = tracing::debug_span!("upload", transfer = lease.id);

        let task = tokio::spawn(
            async move {
                // Held until the transfer settles.
                let lease = lease;
                let mut emit = |p: Progress| {
                    let _ = tx.send(p);
                };
                upload::run(&inner, &request, file, &lease.token, &mut emit).await
            }
            .instrument(span),
        );
        Ok(TransferHandle::new(rx, task, token))
    }
}

/// Read at most `limit` bytes of an error body. Read failures just end the
/// body early; the status code still tells the story.
pub(crate) async fn read_error_body<E>(
    mut body: BoxStream<'static, std::result::Result<bytes::Bytes, E>>,
    limit: usize,
    token: &CancellationToken,
    options: &TransferOptions,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    while out.len() < limit {
        match guarded(token, options.stall_timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => {
                let take = chunk.len().min(limit - out.len());
                out.extend_from_slice(&chunk[..take]);
            }
            Ok(_) | Err(Error::Timeout(_)) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(out)
}
