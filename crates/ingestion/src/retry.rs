//! Wait budgets for inputs that arrive while a job is running.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default pause between availability checks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// How long to keep re-checking for missing inputs.
///
/// A budget of `max_retries = n` means at most `n` sleeps and `n + 1`
/// checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(with = "seconds", rename = "interval_secs")]
    pub interval: Duration,
    pub max_retries: u32,
    /// Retries after which a wait is reported as likely delayed upstream.
    #[serde(default)]
    pub warn_after: Option<u32>,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            warn_after: None,
        }
    }

    pub fn with_warn_after(mut self, retries: u32) -> Self {
        self.warn_after = Some(retries);
        self
    }

    /// HREF member files for the severe product.
    pub fn severe() -> Self {
        Self::new(DEFAULT_INTERVAL, 120)
    }

    /// SREF files and their `gdlist` extracts.
    pub fn sref() -> Self {
        Self::new(DEFAULT_INTERVAL, 60)
    }

    /// HREF member files for the thunder product.
    pub fn thunder() -> Self {
        Self::new(DEFAULT_INTERVAL, 120).with_warn_after(10)
    }

    /// Whether `retries` has reached the delayed-data threshold.
    pub fn is_delayed(&self, retries: u32) -> bool {
        self.warn_after.is_some_and(|n| retries >= n)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::severe()
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
