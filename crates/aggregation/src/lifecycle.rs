//! Per-valid-hour processing state.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{AggregationError, Result};

/// Where one valid hour of one hazard stands within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HourState {
    Pending,
    Computing,
    /// Neighborhood field stored in the incremental cache.
    Cached,
    /// Calibrated product handed to the encoder. Terminal.
    Emitted,
}

impl HourState {
    fn can_become(self, next: HourState) -> bool {
        use HourState::*;
        matches!(
            (self, next),
            (Pending, Computing)
                | (Pending, Cached)
                | (Computing, Cached)
                | (Computing, Emitted)
                | (Cached, Emitted)
        )
    }
}

/// State of every valid hour a job touches, keyed by `YYYYMMDDHH`.
#[derive(Debug, Clone, Default)]
pub struct HourLifecycle {
    states: BTreeMap<String, HourState>,
}

impl HourLifecycle {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            states: keys
                .into_iter()
                .map(|k| (k.into(), HourState::Pending))
                .collect(),
        }
    }

    pub fn state(&self, key: &str) -> Option<HourState> {
        self.states.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn transition(&mut self, key: &str, next: HourState) -> Result<()> {
        let state = self
            .states
            .get_mut(key)
            .ok_or_else(|| AggregationError::UnknownHour(key.to_string()))?;
        let from = *state;
        if !from.can_become(next) {
            return Err(AggregationError::invalid_transition(key, from, next));
        }
        debug!(valid_time = key, from = ?from, to = ?next, "Hour state change");
        *state = next;
        Ok(())
    }

    /// Start computing a neighborhood field.
    pub fn begin(&mut self, key: &str) -> Result<()> {
        self.transition(key, HourState::Computing)
    }

    /// Field computed and cached, or found already in the cache.
    pub fn cache(&mut self, key: &str) -> Result<()> {
        self.transition(key, HourState::Cached)
    }

    pub fn emit(&mut self, key: &str) -> Result<()> {
        self.transition(key, HourState::Emitted)
    }

    /// True once every hour has left `Pending` and `Computing`.
    pub fn is_settled(&self) -> bool {
        self.states
            .values()
            .all(|s| matches!(s, HourState::Cached | HourState::Emitted))
    }

    /// Keys still waiting to be computed.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|(_, s)| **s == HourState::Pending)
            .map(|(k, _)| k.as_str())
    }
}
