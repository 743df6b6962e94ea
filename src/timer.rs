//! Retransmission timer bookkeeping.
//!
//! Reliable delivery requires that an unacknowledged segment is re-sent when
//! no ACK arrives within a bounded time.  [`RetransmitTimer`] tracks the
//! fixed timeout and the per-segment retry budget; the actual sleeping is
//! done by the transfer driver with `tokio::time::sleep`.
//!
//! Timeouts are expected steady-state events, not errors — only an exhausted
//! retry budget becomes a failure ([`crate::session::TransferError::Abandoned`]).

use std::time::Duration;

/// Default retransmission timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default number of retransmissions per segment before the transfer is
/// abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Timeout and retry accounting for one driven segment.
#[derive(Debug)]
pub struct RetransmitTimer {
    timeout: Duration,
    max_retries: u32,
    attempts: u32,
}

impl RetransmitTimer {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            attempts: 0,
        }
    }

    /// Duration the driver should arm the next wait with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of retransmissions recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a timer expiry.  Returns `false` when the retry budget is
    /// exhausted and the transfer must be abandoned instead of retried.
    pub fn record_retry(&mut self) -> bool {
        self.attempts += 1;
        self.attempts <= self.max_retries
    }
}
