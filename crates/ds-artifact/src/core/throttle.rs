use std::time::{Duration, Instant};

/// Rate limiter for non-terminal progress events.
///
/// The first event always passes; later events pass once `interval` has
/// elapsed since the last one that passed.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last:     Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
