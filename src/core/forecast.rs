//! Short-horizon stochastic projection of MAP, HR and SpO2.

use chrono::Duration;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::config::ForecastConfig;
use crate::models::{TrajectoryPoint, VitalsSample};

/// Physiological floor applied to projected MAP and HR.
pub const MAP_HR_FLOOR: f64 = 50.0;
/// Physiological ceiling applied to projected SpO2.
pub const SPO2_CEILING: f64 = 100.0;
/// Placeholder confidence reported with every forecast.
pub const FORECAST_CONFIDENCE: f64 = 0.85;

/// Per-step Gaussian perturbation for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    pub mean: f64,
    pub std: f64,
}

impl Drift {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        self.mean + self.std * z
    }
}

#[derive(Debug, Clone)]
pub struct ForecastEngine {
    step: Duration,
    default_steps: usize,
    max_steps: usize,
    map: Drift,
    heart_rate: Drift,
    spo2: Drift,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::from_config(&ForecastConfig::default())
    }
}

impl ForecastEngine {
    pub fn from_config(config: &ForecastConfig) -> Self {
        let step_minutes = config.step_minutes.max(1);
        let max_steps = config.max_steps.max(1);
        let default_steps = ceil_div(config.default_duration_minutes.max(1), step_minutes);
        Self {
            step: Duration::minutes(step_minutes),
            default_steps: (default_steps as usize).clamp(1, max_steps),
            max_steps,
            map: Drift { mean: -0.5, std: 2.0 },
            heart_rate: Drift { mean: 0.0, std: 1.0 },
            spo2: Drift { mean: 0.0, std: 0.2 },
        }
    }

    pub fn default_steps(&self) -> usize {
        self.default_steps
    }

    /// Number of points needed to cover `duration`, bounded to `[1, max_steps]`.
    pub fn steps_for(&self, duration: Duration) -> usize {
        let minutes = duration.num_minutes().max(1);
        let steps = ceil_div(minutes, self.step.num_minutes().max(1));
        (steps as usize).clamp(1, self.max_steps)
    }

    /// Projects `steps` points spaced one step apart, the first one step after
    /// `start`. Each channel is a random walk from the raw start value; the
    /// physiological bounds apply to the emitted points only.
    pub fn project<R: Rng + ?Sized>(
        &self,
        start: &VitalsSample,
        steps: usize,
        rng: &mut R,
    ) -> Vec<TrajectoryPoint> {
        let mut map = start.map;
        let mut hr = start.heart_rate;
        let mut spo2 = start.spo2;

        (1..=steps)
            .map(|k| {
                map += self.map.sample(rng);
                hr += self.heart_rate.sample(rng);
                spo2 += self.spo2.sample(rng);
                TrajectoryPoint {
                    timestamp: start.timestamp + self.step * k as i32,
                    predicted_map: clamp_floor(map),
                    predicted_hr: clamp_floor(hr),
                    predicted_spo2: clamp_spo2(spo2),
                }
            })
            .collect()
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

// `f64::max`/`min` discard NaN, so non-finite input still lands in range.
fn clamp_floor(x: f64) -> f64 {
    x.max(MAP_HR_FLOOR)
}

fn clamp_spo2(x: f64) -> f64 {
    x.max(0.0).min(SPO2_CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn start(map: f64, hr: f64, spo2: f64) -> VitalsSample {
        VitalsSample {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            map,
            heart_rate: hr,
            spo2,
            respiratory_rate: 16.0,
            temperature: 36.5,
            etco2: 35.0,
            bis: None,
        }
    }

    #[test]
    fn test_default_is_six_points_five_minutes_apart() {
        let engine = ForecastEngine::default();
        assert_eq!(engine.default_steps(), 6);

        let origin = start(75.0, 80.0, 98.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let trajectory = engine.project(&origin, engine.default_steps(), &mut rng);
        assert_eq!(trajectory.len(), 6);
        assert_eq!(trajectory[0].timestamp, origin.timestamp + Duration::minutes(5));
        assert_eq!(trajectory[5].timestamp, origin.timestamp + Duration::minutes(30));
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let engine = ForecastEngine::default();
        let origin = start(70.0, 90.0, 97.0);
        let a = engine.project(&origin, 6, &mut ChaCha8Rng::seed_from_u64(9));
        let b = engine.project(&origin, 6, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_steps_for_duration() {
        let engine = ForecastEngine::default();
        assert_eq!(engine.steps_for(Duration::minutes(30)), 6);
        assert_eq!(engine.steps_for(Duration::minutes(31)), 7);
        assert_eq!(engine.steps_for(Duration::minutes(1)), 1);
        assert_eq!(engine.steps_for(Duration::zero()), 1);
        assert_eq!(engine.steps_for(Duration::hours(48)), 24);
    }

    #[test]
    fn test_non_finite_start_is_clamped() {
        let engine = ForecastEngine::default();
        let origin = start(f64::NAN, f64::NEG_INFINITY, f64::INFINITY);
        let trajectory = engine.project(&origin, 6, &mut ChaCha8Rng::seed_from_u64(3));
        for point in trajectory {
            assert!(point.predicted_map >= 50.0);
            assert!(point.predicted_hr >= 50.0);
            assert!(point.predicted_spo2 <= 100.0);
        }
    }

    #[test]
    fn test_walk_continues_below_floor() {
        let engine = ForecastEngine::default();
        let origin = start(50.0, 80.0, 99.9);
        let trajectory = engine.project(&origin, 24, &mut ChaCha8Rng::seed_from_u64(17));

        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut map = origin.map;
        let mut spo2 = origin.spo2;
        for point in &trajectory {
            map += engine.map.sample(&mut rng);
            engine.heart_rate.sample(&mut rng);
            spo2 += engine.spo2.sample(&mut rng);
            assert_eq!(point.predicted_map, map.max(MAP_HR_FLOOR));
            assert_eq!(point.predicted_spo2, spo2.max(0.0).min(SPO2_CEILING));
        }
    }

    #[test]
    fn test_walk_starts_from_raw_value() {
        let engine = ForecastEngine::default();
        let origin = start(20.0, 80.0, 98.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let trajectory = engine.project(&origin, 1, &mut rng);

        let mut replay = ChaCha8Rng::seed_from_u64(5);
        let map = origin.map + engine.map.sample(&mut replay);
        assert!(map < MAP_HR_FLOOR);
        assert_eq!(trajectory[0].predicted_map, MAP_HR_FLOOR);
    }

    proptest! {
        #[test]
        fn prop_trajectory_stays_physiological(
            map in -1e6f64..1e6,
            hr in -1e6f64..1e6,
            spo2 in -1e6f64..1e6,
            seed in any::<u64>(),
        ) {
            let engine = ForecastEngine::default();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let trajectory = engine.project(&start(map, hr, spo2), 6, &mut rng);
            prop_assert_eq!(trajectory.len(), 6);
            for point in trajectory {
                prop_assert!(point.predicted_map >= 50.0);
                prop_assert!(point.predicted_hr >= 50.0);
                prop_assert!(point.predicted_spo2 <= 100.0);
            }
        }
    }
}
