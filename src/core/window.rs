//! Bounded, time-ordered retention of vitals samples and the events derived
//! from them.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::WindowConfig;
use crate::error::{EngineError, Result};
use crate::models::{ClinicalEvent, VitalsSample};

/// Largest retention `chrono::Duration::minutes` accepts.
const MAX_RETENTION_MINUTES: i64 = i64::MAX / 60_000;

/// `None` when `now - duration` falls outside chrono's date range.
fn cutoff(now: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(duration)
}

#[derive(Debug, Clone)]
pub struct VitalsWindow {
    samples: VecDeque<VitalsSample>,
    events: VecDeque<ClinicalEvent>,
    retention: Duration,
    max_samples: Option<usize>,
}

impl VitalsWindow {
    pub fn new(retention: Duration, max_samples: Option<usize>) -> Self {
        Self {
            samples: VecDeque::new(),
            events: VecDeque::new(),
            retention,
            max_samples,
        }
    }

    pub fn from_config(config: &WindowConfig) -> Self {
        let max_samples = match config.max_samples {
            0 => None,
            n => Some(n),
        };
        let minutes = config.retention_minutes.clamp(0, MAX_RETENTION_MINUTES);
        Self::new(Duration::minutes(minutes), max_samples)
    }

    /// Appends `sample` with the events derived from it, then evicts
    /// everything older than the retention horizon relative to `now`,
    /// followed by the count cap. Samples and events go through the same
    /// eviction pass.
    ///
    /// Timestamps must strictly increase; a sample at or before the latest
    /// retained one is rejected and the window is left untouched.
    pub fn append<I>(&mut self, sample: VitalsSample, events: I, now: DateTime<Utc>) -> Result<()>
    where
        I: IntoIterator<Item = ClinicalEvent>,
    {
        if let Some(last) = self.samples.back() {
            if sample.timestamp <= last.timestamp {
                return Err(EngineError::OutOfOrderSample {
                    last: last.timestamp,
                    got: sample.timestamp,
                });
            }
        }
        self.samples.push_back(sample);
        self.events.extend(events);
        self.evict(now);
        Ok(())
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let before = (self.samples.len(), self.events.len());

        if let Some(cutoff) = cutoff(now, self.retention) {
            while self.samples.front().map_or(false, |s| s.timestamp < cutoff) {
                self.samples.pop_front();
            }
            while self.events.front().map_or(false, |e| e.timestamp < cutoff) {
                self.events.pop_front();
            }
        }
        if let Some(max) = self.max_samples {
            while self.samples.len() > max {
                self.samples.pop_front();
            }
            while self.events.len() > max {
                self.events.pop_front();
            }
        }

        let evicted = (before.0 - self.samples.len(), before.1 - self.events.len());
        if evicted != (0, 0) {
            debug!(samples = evicted.0, events = evicted.1, "evicted from vitals window");
        }
    }

    pub fn latest(&self) -> Result<&VitalsSample> {
        self.samples.back().ok_or(EngineError::EmptyWindow)
    }

    pub fn first(&self) -> Option<&VitalsSample> {
        self.samples.front()
    }

    /// Samples with a timestamp within `duration` of `now`, oldest first.
    /// A `duration` reaching past the representable date range returns
    /// everything.
    pub fn recent(&self, duration: Duration, now: DateTime<Utc>) -> Vec<VitalsSample> {
        let start = match cutoff(now, duration) {
            Some(cutoff) => self.samples.partition_point(|s| s.timestamp < cutoff),
            None => 0,
        };
        self.samples.range(start..).cloned().collect()
    }

    pub fn recent_events(&self, duration: Duration, now: DateTime<Utc>) -> Vec<ClinicalEvent> {
        let start = match cutoff(now, duration) {
            Some(cutoff) => self.events.partition_point(|e| e.timestamp < cutoff),
            None => 0,
        };
        self.events.range(start..).cloned().collect()
    }

    /// The last `n` samples, oldest first.
    pub fn tail(&self, n: usize) -> Vec<VitalsSample> {
        let start = self.samples.len().saturating_sub(n);
        self.samples.range(start..).cloned().collect()
    }

    pub fn tail_events(&self, n: usize) -> Vec<ClinicalEvent> {
        let start = self.events.len().saturating_sub(n);
        self.events.range(start..).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.events.clear();
    }
}
