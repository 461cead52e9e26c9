use crate::host::KeyValueStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Key under which the last automatic check time is persisted.
pub const LAST_CHECK_KEY: &str = "osmflux_last_update_checked_at";

/// Decides whether an automatic check is due.
///
/// Only automatic checks on startup go through the gate; a user-initiated check always
/// runs.
#[derive(Debug, Clone, Copy)]
pub struct CadenceGate {
    interval: Duration,
}

impl Default for CadenceGate {
    fn default() -> Self {
        Self {
            interval: Duration::hours(12),
        }
    }
}

impl CadenceGate {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` when never checked, or when at least one interval has elapsed.
    #[must_use]
    pub fn should_check_now(&self, last_check: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_check {
            None => true,
            Some(last) => now - last >= self.interval,
        }
    }

    /// When the next automatic check becomes due.
    ///
    /// `None` when never checked, or when the due time is past what a `DateTime` can hold.
    #[must_use]
    pub fn next_check_at(&self, last_check: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        last_check.and_then(|last| last.checked_add_signed(self.interval))
    }
}

/// Persisted last-check timestamp.
///
/// The read-then-write is not atomic; two processes starting together may both run a
/// check. Re-running a check is harmless because planning is digest based.
#[derive(Clone)]
pub struct LastCheckRecord {
    store: Arc<dyn KeyValueStore>,
}

impl LastCheckRecord {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
        }
    }

    /// Read the last check time. Missing, unreadable and unparsable values all read as
    /// "never checked".
    pub async fn read(&self) -> Option<DateTime<Utc>> {
        let raw = match self.store.get(LAST_CHECK_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read last update check time: {:#}", e);
                return None;
            }
        };

        let parsed = DateTime::parse_from_rfc3339(raw.trim())
            .or_else(|_| DateTime::parse_from_rfc2822(raw.trim()))
            .map(|dt| dt.with_timezone(&Utc));

        match parsed {
            Ok(dt) => Some(dt),
            Err(_) => {
                debug!("Ignoring unparsable last check time '{}'", raw);
                None
            }
        }
    }

    pub async fn write(&self, at: DateTime<Utc>) -> Result<()> {
        self.store.set(LAST_CHECK_KEY, &at.to_rfc3339()).await
    }
}
