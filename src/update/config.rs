use crate::update::cadence::CadenceGate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update behaviour settings, the `[update]` table of the global config.
///
/// ```toml
/// [update]
/// check_on_startup = true
/// check_interval = 43200
/// request_timeout = 120
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Run an automatic (gated) check when the application starts.
    #[serde(default = "default_check_on_startup")]
    pub check_on_startup: bool,

    /// Minimum seconds between automatic checks.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Upper bound in seconds for any single HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            check_on_startup: default_check_on_startup(),
            check_interval: default_check_interval(),
            request_timeout: default_request_timeout(),
        }
    }
}

const fn default_check_on_startup() -> bool {
    true
}

const fn default_check_interval() -> u64 {
    12 * 60 * 60
}

const fn default_request_timeout() -> u64 {
    120
}

/// Longest honoured check interval (100 years); larger values are clamped.
pub const MAX_CHECK_INTERVAL: u64 = 100 * 365 * 24 * 60 * 60;

impl UpdateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self == &Self::default()
    }

    /// Cadence gate for automatic checks.
    #[must_use]
    pub fn gate(&self) -> CadenceGate {
        let seconds = self.check_interval.min(MAX_CHECK_INTERVAL).cast_signed();
        CadenceGate::new(chrono::Duration::seconds(seconds))
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}
