use std::fmt;

use crate::error::Result;

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Remote to local.
    Download,
    /// Local to remote.
    Upload,
}

/// Phases of a transfer as seen through progress events.
///
/// A transfer emits zero or more `Transferring` events followed by exactly
/// one `Completed` event when it succeeds. Failed and cancelled transfers
/// stop emitting without a `Completed` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    /// Bytes are moving.
    #[default]
    Transferring,

    /// All bytes moved and the transfer settled successfully.
    Completed,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Transferring => write!(f, "Transferring"),
            TransferPhase::Completed => write!(f, "Completed"),
        }
    }
}

/// A single progress observation for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub direction: Direction,

    pub phase: TransferPhase,

    /// Bytes sent or received so far.
    pub bytes_transferred: u64,

    /// Total expected bytes, if known.
    ///
    /// Downloads learn it from `Content-Length`; it stays `None` for
    /// chunked responses. Uploads always know it.
    pub total_bytes: Option<u64>,
}

impl Progress {
    /// Whole-number completion percentage in `[0, 100]`.
    ///
    /// A completed transfer is always 100, even when the total was never
    /// known or is zero. Otherwise `None` while the total is unknown.
    #[must_use]
    pub fn percentage(&self) -> Option<u8> {
        if self.is_completed() {
            return Some(100);
        }
        self.total_bytes.map(|total| percent_of(self.bytes_transferred, total))
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == TransferPhase::Completed
    }
}

/// Floor of `done / total * 100`, clamped to 100. A zero total is 0%.
pub(crate) fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(done) * 100) / u128::from(total);
    pct.min(100) as u8
}

/// Terminal classification of a transfer, produced once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Success,
    Cancelled,
    NotFound,
    Error { code: Option<u16>, message: String },
}

impl TransferOutcome {
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => TransferOutcome::Success,
            Err(err) if err.is_cancelled() => TransferOutcome::Cancelled,
            Err(err) if err.is_not_found() => TransferOutcome::NotFound,
            Err(err) => TransferOutcome::Error {
                code:    err.code(),
                message: err.normalize().body.message,
            },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn progress(bytes: u64, total: Option<u64>, phase: TransferPhase) -> Progress {
        Progress {
            direction: Direction::Download,
            phase,
            bytes_transferred: bytes,
            total_bytes: total,
        }
    }

    #[test]
    fn percentage_quarters() {
        let t = TransferPhase::Transferring;
        assert_eq!(progress(250, Some(1000), t).percentage(), Some(25));
        assert_eq!(progress(500, Some(1000), t).percentage(), Some(50));
        assert_eq!(progress(999, Some(1000), t).percentage(), Some(99));
    }

    #[test]
    fn percentage_clamped() {
        let t = TransferPhase::Transferring;
        assert_eq!(progress(2000, Some(1000), t).percentage(), Some(100));
        assert_eq!(progress(u64::MAX, Some(1), t).percentage(), Some(100));
    }

    #[test]
    fn percentage_unknown_or_zero_total() {
        let t = TransferPhase::Transferring;
        assert_eq!(progress(10, None, t).percentage(), None);
        assert_eq!(progress(0, Some(0), t).percentage(), Some(0));
        assert_eq!(progress(0, Some(0), TransferPhase::Completed).percentage(), Some(100));
        assert_eq!(progress(10, None, TransferPhase::Completed).percentage(), Some(100));
    }

    #[test]
    fn outcome_from_result() {
        assert_eq!(TransferOutcome::from_result(&Ok(())), TransferOutcome::Success);
        assert_eq!(
            TransferOutcome::from_result::<()>(&Err(Error::Cancelled)),
            TransferOutcome::Cancelled
        );
        assert_eq!(
            TransferOutcome::from_result::<()>(&Err(Error::NotFound)),
            TransferOutcome::NotFound
        );
        assert_eq!(
            TransferOutcome::from_result::<()>(&Err(Error::Status {
                status: 503,
                message: "busy".into()
            })),
            TransferOutcome::Error {
                code:    Some(503),
                message: "busy".into(),
            }
        );
    }
}
