//! Process-wide message counter and audit log.
//!
//! Every successfully routed message bumps the counter and emits one audit
//! line on the `filament::audit` target:
//!
//! ```text
//! 2026-01-01T00:00:00.000Z  000042  first 64 characters of the message
//! ```
//!
//! The counter and the log emission share one mutex so that increments are
//! never lost and lines never interleave under concurrent delivery.

use chrono::{DateTime, SecondsFormat, Utc};
use metrics::counter;
use parking_lot::Mutex;
use tracing::info;

use crate::metrics::RELAY_MESSAGES_TOTAL;

/// Number of message characters kept in an audit line.
pub const LOG_PREVIEW_CHARS: usize = 64;

/// Target used for audit lines.
pub const AUDIT_TARGET: &str = "filament::audit";

/// One recorded delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    /// Counter value after this delivery (starts at 1).
    pub seq: u64,
    /// When the delivery was recorded.
    pub timestamp: DateTime<Utc>,
    /// Message text truncated to [`LOG_PREVIEW_CHARS`] characters.
    pub preview: String,
}

impl AuditEntry {
    /// Render the audit line: ISO-8601 timestamp, 6-digit counter, preview.
    pub fn line(&self) -> String {
        format!(
            "{}  {:06}  {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.seq,
            self.preview
        )
    }
}

/// Monotonic delivery counter with its audit log.
#[derive(Debug, Default)]
pub struct ActivityLog {
    count: Mutex<u64>,
}

impl ActivityLog {
    /// Create a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one delivered message and log it.
    pub fn record(&self, message: &str) -> AuditEntry {
        let mut count = self.count.lock();
        *count += 1;
        let entry = AuditEntry {
            seq: *count,
            timestamp: Utc::now(),
            preview: preview(message).to_string(),
        };
        info!(target: AUDIT_TARGET, seq = entry.seq, "{}", entry.line());
        counter!(RELAY_MESSAGES_TOTAL).increment(1);
        entry
    }

    /// Messages delivered since process start.
    pub fn count(&self) -> u64 {
        *self.count.lock()
    }
}

/// The first [`LOG_PREVIEW_CHARS`] characters of `message`.
pub fn preview(message: &str) -> &str {
    match message.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((end, _)) => &message[..end],
        None => message,
    }
}
