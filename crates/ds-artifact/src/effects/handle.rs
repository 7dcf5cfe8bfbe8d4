use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::data::Progress;
use crate::error::{Error, Result};

/// Handle to a transfer running in the background.
///
/// Progress events arrive in order on [`next_progress`](Self::next_progress);
/// the stream ends once the transfer settles. Dropping an unfinished handle
/// cancels the transfer.
#[derive(Debug)]
pub struct TransferHandle<T> {
    progress: UnboundedReceiver<Progress>,
    task:     Option<JoinHandle<Result<T>>>,
    token:    CancellationToken,
}

impl<T> TransferHandle<T> {
    pub(crate) fn new(
        progress: UnboundedReceiver<Progress>,
        task: JoinHandle<Result<T>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            progress,
            task: Some(task),
            token,
        }
    }

    /// Wait for the next progress event. `None` once the transfer settled
    /// and every event was consumed.
    pub async fn next_progress(&mut self) -> Option<Progress> { self.progress.recv().await }

    /// Cancel this transfer. It settles as [`Error::Cancelled`] and emits
    /// no further progress.
    pub fn abort(&self) { self.token.cancel(); }

    pub fn is_finished(&self) -> bool { self.task.as_ref().is_none_or(JoinHandle::is_finished) }

    /// A clone of the token cancelling this transfer, e.g. for a signal
    /// handler.
    pub fn cancellation_token(&self) -> CancellationToken { self.token.clone() }

    /// Wait for the transfer to settle.
    pub async fn join(mut self) -> Result<T> {
        let Some(task) = self.task.take() else {
            return Err(Error::Cancelled);
        };
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }
}

impl<T> Drop for TransferHandle<T> {
    fn drop(&mut self) {
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            self.token.cancel();
        }
    }
}
