//! Vitals sources feeding the engine.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::models::VitalsSample;

/// Produces one vitals reading per call.
pub trait VitalsFeed: Send {
    fn next_sample(&mut self, timestamp: DateTime<Utc>) -> VitalsSample;
}

/// Intraoperative-looking vitals: slow sinusoidal MAP and HR oscillation
/// with Gaussian noise. BIS is reported on roughly 70% of ticks.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    rng: ChaCha8Rng,
    tick: u64,
}

impl SyntheticFeed {
    /// `None` seeds from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng, tick: 0 }
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    fn noise(&mut self, std: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        std * z
    }
}

impl VitalsFeed for SyntheticFeed {
    fn next_sample(&mut self, timestamp: DateTime<Utc>) -> VitalsSample {
        let n = self.tick as f64;
        self.tick += 1;

        let map = (75.0 + 10.0 * (0.1 * n).sin() + self.noise(5.0)).max(50.0);
        let heart_rate = (80.0 + 15.0 * (0.08 * n).cos() + self.noise(8.0)).max(50.0);
        let spo2 = (98.0 + self.noise(1.0)).min(100.0);
        let respiratory_rate = (16.0 + self.noise(2.0)).max(8.0);
        let temperature = 36.5 + self.noise(0.3);
        let etco2 = 35.0 + self.noise(3.0);
        let bis = if self.rng.gen_bool(0.7) {
            Some(45.0 + self.noise(5.0))
        } else {
            None
        };

        VitalsSample {
            timestamp,
            map,
            heart_rate,
            spo2,
            respiratory_rate,
            temperature,
            etco2,
            bis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn run(feed: &mut SyntheticFeed, n: i64) -> Vec<VitalsSample> {
        let start = Utc::now();
        (0..n)
            .map(|i| feed.next_sample(start + Duration::seconds(3 * i)))
            .collect()
    }

    #[test]
    fn test_seeded_feed_is_reproducible() {
        let start = Utc::now();
        let mut a = SyntheticFeed::new(Some(5));
        let mut b = SyntheticFeed::new(Some(5));
        for i in 0..50 {
            let ts = start + Duration::seconds(i);
            assert_eq!(a.next_sample(ts), b.next_sample(ts));
        }
        assert_eq!(a.ticks(), 50);
    }

    #[test]
    fn test_samples_respect_bounds() {
        let mut feed = SyntheticFeed::new(Some(11));
        for sample in run(&mut feed, 500) {
            assert!(sample.map >= 50.0);
            assert!(sample.heart_rate >= 50.0);
            assert!(sample.spo2 <= 100.0);
            assert!(sample.respiratory_rate >= 8.0);
        }
    }

    #[test]
    fn test_bis_is_intermittent() {
        let mut feed = SyntheticFeed::new(Some(3));
        let samples = run(&mut feed, 1000);
        let present = samples.iter().filter(|s| s.bis.is_some()).count();
        assert!((600..=800).contains(&present), "bis present {present} times");
    }
}
