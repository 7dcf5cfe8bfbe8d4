use std::sync::Arc;
use std::time::Duration;

/// Tuning knobs shared by every transfer issued from one client.
///
/// # Examples
///
/// ```
/// use ds_artifact::TransferOptions;
/// use std::time::Duration;
///
/// let options = TransferOptions::default()
///     .progress_interval(Duration::from_millis(250))
///     .stall_timeout(Some(Duration::from_secs(30)))
///     .header("Authorization", "Bearer token");
/// ```
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Minimum spacing between two non-terminal progress events.
    ///
    /// The terminal event is never throttled. `Duration::ZERO` reports
    /// every chunk.
    ///
    /// Default: 100ms
    pub progress_interval: Duration,

    /// Longest pause tolerated without any bytes moving.
    ///
    /// Default: 60s
    pub stall_timeout: Option<Duration>,

    /// Size of the chunks an upload body is read in.
    ///
    /// Default: 64 KiB
    pub chunk_size: usize,

    /// Upper bound on how much of an error response body is kept for
    /// message extraction.
    ///
    /// Default: 16 KiB
    pub max_error_body: usize,

    /// Extra headers sent with every request.
    pub headers: Arc<[(String, String)]>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_millis(100),
            stall_timeout:     Some(Duration::from_secs(60)),
            chunk_size:        64 * 1024,
            max_error_body:    16 * 1024,
            headers:           Arc::new([]),
        }
    }
}

impl TransferOptions {
    #[must_use]
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    #[must_use]
    pub fn stall_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Set the upload chunk size. Zero is bumped to one byte.
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn max_error_body(mut self, max: usize) -> Self {
        self.max_error_body = max;
        self
    }

    /// Add a single header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers: Vec<_> = self.headers.iter().cloned().collect();
        headers.push((key.into(), value.into()));
        self.headers = Arc::from(headers);
        self
    }

    /// Replace all headers.
    #[must_use]
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = Arc::from(headers);
        self
    }
}
