//! Bounded wait for inputs that are still being written upstream.
//!
//! Each pass calls a check that loads whatever has arrived and reports what
//! is still missing. Between passes the loop sleeps one interval; that sleep
//! is the only suspension point.

use std::fmt;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::retry::RetryPolicy;

/// Outcome of one availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// `missing` inputs are still absent. `detail` names them.
    Waiting { missing: usize, detail: String },
}

impl Readiness {
    pub fn waiting(missing: usize, detail: impl Into<String>) -> Self {
        Self::Waiting {
            missing,
            detail: detail.into(),
        }
    }

    /// `Ready` when `names` is empty, otherwise waiting on all of them.
    pub fn from_missing<T: fmt::Display>(names: &[T]) -> Self {
        if names.is_empty() {
            return Self::Ready;
        }
        let mut detail = names
            .iter()
            .take(5)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if names.len() > 5 {
            detail.push_str(&format!(" and {} more", names.len() - 5));
        }
        Self::waiting(names.len(), detail)
    }
}

/// What a completed wait looked like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Sleeps taken before the inputs were complete.
    pub retries: u32,
    /// The wait crossed the likely-delayed threshold.
    pub delayed: bool,
}

/// Runs availability checks under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Synchronizer {
    policy: RetryPolicy,
}

impl Synchronizer {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `check` until it reports [`Readiness::Ready`].
    ///
    /// Errors from `check` end the wait immediately. When the retry budget
    /// is spent the result is [`SyncError::InsufficientEnsemble`], naming
    /// the inputs still missing.
    pub async fn wait_until<F>(&self, what: &str, mut check: F) -> Result<SyncReport>
    where
        F: FnMut() -> Result<Readiness>,
    {
        let mut report = SyncReport::default();
        loop {
            if report.retries > 0 {
                tokio::time::sleep(self.policy.interval).await;
            }

            let (missing, detail) = match check()? {
                Readiness::Ready => {
                    if report.retries > 0 {
                        info!(what, retries = report.retries, "Inputs complete after waiting");
                    } else {
                        debug!(what, "Inputs complete");
                    }
                    return Ok(report);
                }
                Readiness::Waiting { missing, detail } => (missing, detail),
            };

            if self.policy.is_delayed(report.retries) {
                report.delayed = true;
                warn!(
                    what,
                    missing,
                    retry = report.retries,
                    max_retries = self.policy.max_retries,
                    "Inputs likely delayed upstream, still waiting"
                );
            }

            if report.retries >= self.policy.max_retries {
                return Err(SyncError::InsufficientEnsemble {
                    what: what.to_string(),
                    retries: report.retries,
                    shortfall: format!("{} missing: {}", missing, detail),
                });
            }

            report.retries += 1;
            info!(
                what,
                missing,
                retry = report.retries,
                max_retries = self.policy.max_retries,
                delay_secs = self.policy.interval.as_secs(),
                "Inputs missing, retrying"
            );
        }
    }
}
