//! Observable state for one transfer, as a consumer would render it.

use std::fmt;

use crate::data::{Progress, TransferOutcome};

/// Lifecycle of a single transfer request.
///
/// ```text
/// Idle -> InProgress -> { Completed | Cancelled | Errored }
/// ```
///
/// Terminal states are final until [`TransferStatus::reset`] starts a new
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    #[default]
    Idle,
    InProgress,
    Completed,
    Cancelled,
    Errored,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Cancelled | TransferState::Errored
        )
    }
}

type CloseHandler = Box<dyn FnMut() + Send>;

/// Folds progress events and the terminal outcome into percentage and
/// completed/error/warning flags.
#[derive(Default)]
pub struct TransferStatus {
    state:    TransferState,
    percent:  u8,
    error:    bool,
    warning:  bool,
    message:  Option<String>,
    on_close: Option<CloseHandler>,
    closed:   bool,
}

impl fmt::Debug for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferStatus")
            .field("state", &self.state)
            .field("percent", &self.percent)
            .field("error", &self.error)
            .field("warning", &self.warning)
            .field("message", &self.message)
            .field("closed", &self.closed)
            .finish()
    }
}

impl TransferStatus {
    pub fn new() -> Self { Self::default() }

    /// Register the handler run when the transfer is dismissed.
    ///
    /// It runs at most once per request: on a `Cancelled` outcome or on an
    /// explicit [`close`](Self::close).
    #[must_use]
    pub fn with_close_handler(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(handler));
        self
    }

    /// Apply a progress event. Returns `false` when the event was ignored
    /// because the request already reached a terminal state.
    pub fn on_progress(&mut self, progress: &Progress) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = TransferState::InProgress;
        if let Some(pct) = progress.percentage() {
            self.percent = self.percent.max(pct);
        }
        if progress.is_completed() {
            self.percent = 100;
            self.state = TransferState::Completed;
        }
        true
    }

    /// Apply the terminal outcome. Returns `false` when a terminal state
    /// other than the one implied by a completed progress event was
    /// already reached.
    pub fn on_outcome(&mut self, outcome: &TransferOutcome) -> bool {
        if self.state.is_terminal() {
            return self.state == TransferState::Completed && outcome.is_success();
        }
        match outcome {
            TransferOutcome::Success => {
                self.percent = 100;
                self.state = TransferState::Completed;
            }
            TransferOutcome::Cancelled => {
                self.state = TransferState::Cancelled;
                self.close();
            }
            TransferOutcome::NotFound => {
                self.state = TransferState::Errored;
                self.warning = true;
                self.message = Some("artifact not found".to_string());
            }
            TransferOutcome::Error { message, .. } => {
                self.state = TransferState::Errored;
                self.error = true;
                self.message = Some(message.clone());
            }
        }
        true
    }

    /// Dismiss the transfer, running the close handler if it has not run
    /// for this request yet.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(handler) = self.on_close.as_mut() {
            handler();
        }
    }

    /// Prepare for a retry: back to `Idle` with the percentage at 0. The
    /// close handler stays registered.
    pub fn reset(&mut self) {
        self.state = TransferState::Idle;
        self.percent = 0;
        self.error = false;
        self.warning = false;
        self.message = None;
        self.closed = false;
    }

    pub fn state(&self) -> TransferState { self.state }

    pub fn percent(&self) -> u8 { self.percent }

    pub fn is_completed(&self) -> bool { self.state == TransferState::Completed }

    pub fn has_error(&self) -> bool { self.error }

    pub fn has_warning(&self) -> bool { self.warning }

    pub fn message(&self) -> Option<&str> { self.message.as_deref() }

    /// Retry is offered for failures only; a cancelled transfer closes.
    pub fn can_retry(&self) -> bool { self.state == TransferState::Errored }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::data::{Direction, TransferPhase};

    fn event(bytes: u64, total: u64, phase: TransferPhase) -> Progress {
        Progress {
            direction: Direction::Download,
            phase,
            bytes_transferred: bytes,
            total_bytes: Some(total),
        }
    }

    #[test]
    fn idle_to_completed() {
        let mut status = TransferStatus::new();
        assert_eq!(status.state(), TransferState::Idle);

        assert!(status.on_progress(&event(250, 1000, TransferPhase::Transferring)));
        assert_eq!(status.state(), TransferState::InProgress);
        assert_eq!(status.percent(), 25);
        assert!(!status.is_completed());

        status.on_progress(&event(500, 1000, TransferPhase::Transferring));
        assert_eq!(status.percent(), 50);
        assert!(!status.is_completed());

        status.on_progress(&event(1000, 1000, TransferPhase::Completed));
        assert_eq!(status.percent(), 100);
        assert!(status.is_completed());

        assert!(status.on_outcome(&TransferOutcome::Success));
        assert!(!status.has_error());
    }

    #[test]
    fn percent_never_decreases() {
        let mut status = TransferStatus::new();
        status.on_progress(&event(600, 1000, TransferPhase::Transferring));
        status.on_progress(&event(100, 1000, TransferPhase::Transferring));
        assert_eq!(status.percent(), 60);
    }

    #[test]
    fn terminal_is_final() {
        let mut status = TransferStatus::new();
        status.on_outcome(&TransferOutcome::Error {
            code:    Some(500),
            message: "boom".into(),
        });
        assert_eq!(status.state(), TransferState::Errored);
        assert!(!status.on_progress(&event(10, 10, TransferPhase::Completed)));
        assert!(!status.on_outcome(&TransferOutcome::Success));
        assert_eq!(status.state(), TransferState::Errored);
        assert!(status.has_error());
        assert_eq!(status.message(), Some("boom"));
        assert!(status.can_retry());
    }

    #[test]
    fn not_found_is_a_warning() {
        let mut status = TransferStatus::new();
        status.on_outcome(&TransferOutcome::NotFound);
        assert!(status.has_warning());
        assert!(!status.has_error());
        assert!(status.can_retry());
    }

    #[test]
    fn cancel_closes_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        let mut status = TransferStatus::new().with_close_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        status.on_progress(&event(1, 10, TransferPhase::Transferring));
        status.on_outcome(&TransferOutcome::Cancelled);
        status.on_outcome(&TransferOutcome::Cancelled);
        status.close();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(status.state(), TransferState::Cancelled);
        assert!(!status.can_retry());
        assert!(!status.has_error());
    }

    #[test]
    fn reset_for_retry() {
        let mut status = TransferStatus::new();
        status.on_progress(&event(7, 10, TransferPhase::Transferring));
        status.on_outcome(&TransferOutcome::Error {
            code:    None,
            message: "network error".into(),
        });
        status.reset();

        assert_eq!(status.state(), TransferState::Idle);
        assert_eq!(status.percent(), 0);
        assert!(!status.has_error());
        assert_eq!(status.message(), None);
    }
}
