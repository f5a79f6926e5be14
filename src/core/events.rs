//! Fixed-threshold event detection on a single vitals sample.

use crate::models::{ClinicalEvent, EventKind, Severity, VitalsSample};

pub const HYPOTENSION_MAP: f64 = 65.0;
pub const TACHYCARDIA_HR: f64 = 100.0;
pub const HYPOXEMIA_SPO2: f64 = 95.0;

const SOURCE: &str = "MONITOR";

/// Stateless threshold detector. Rules are independent; emission order is
/// MAP, then HR, then SpO2.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventDetector;

impl EventDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(&self, vitals: &VitalsSample) -> Vec<ClinicalEvent> {
        let mut events = Vec::new();

        if vitals.map < HYPOTENSION_MAP {
            events.push(event(
                vitals,
                EventKind::Hypotension,
                format!("MAP dropped to {:.1} mmHg", vitals.map),
                Severity::High,
            ));
        }

        if vitals.heart_rate > TACHYCARDIA_HR {
            events.push(event(
                vitals,
                EventKind::Tachycardia,
                format!("Heart rate elevated to {:.0} bpm", vitals.heart_rate),
                Severity::Medium,
            ));
        }

        if vitals.spo2 < HYPOXEMIA_SPO2 {
            events.push(event(
                vitals,
                EventKind::Hypoxemia,
                format!("SpO2 decreased to {:.1}%", vitals.spo2),
                Severity::High,
            ));
        }

        events
    }
}

fn event(
    vitals: &VitalsSample,
    kind: EventKind,
    description: String,
    severity: Severity,
) -> ClinicalEvent {
    ClinicalEvent {
        timestamp: vitals.timestamp,
        kind,
        description,
        severity,
        source: SOURCE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use test_case::test_case;

    fn vitals(map: f64, hr: f64, spo2: f64) -> VitalsSample {
        VitalsSample {
            timestamp: Utc::now(),
            map,
            heart_rate: hr,
            spo2,
            respiratory_rate: 16.0,
            temperature: 36.5,
            etco2: 35.0,
            bis: None,
        }
    }

    fn kinds(events: &[ClinicalEvent]) -> Vec<EventKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test_case(75.0, 80.0, 98.0, vec![] ; "normal")]
    #[test_case(64.9, 80.0, 98.0, vec![EventKind::Hypotension] ; "hypotension")]
    #[test_case(65.0, 100.0, 95.0, vec![] ; "thresholds are exclusive")]
    #[test_case(75.0, 101.0, 98.0, vec![EventKind::Tachycardia] ; "tachycardia")]
    #[test_case(75.0, 80.0, 94.0, vec![EventKind::Hypoxemia] ; "hypoxemia")]
    #[test_case(
        60.0, 120.0, 90.0,
        vec![EventKind::Hypotension, EventKind::Tachycardia, EventKind::Hypoxemia]
        ; "all fire in fixed order"
    )]
    fn test_detect(map: f64, hr: f64, spo2: f64, expected: Vec<EventKind>) {
        let events = EventDetector::new().detect(&vitals(map, hr, spo2));
        assert_eq!(kinds(&events), expected);
    }

    #[test]
    fn test_event_fields() {
        let sample = vitals(60.04, 80.0, 98.0);
        let events = EventDetector::new().detect(&sample);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, sample.timestamp);
        assert_eq!(events[0].description, "MAP dropped to 60.0 mmHg");
        assert_eq!(events[0].severity, Severity::High);
        assert_eq!(events[0].source, "MONITOR");
    }

    proptest! {
        #[test]
        fn prop_single_hypotension_event_iff_map_below_65(
            map in 20.0f64..140.0,
            hr in 30.0f64..200.0,
            spo2 in 60.0f64..100.0,
        ) {
            let events = EventDetector::new().detect(&vitals(map, hr, spo2));
            let hypotension: Vec<_> = events
                .iter()
                .filter(|e| e.kind == EventKind::Hypotension)
                .collect();
            if map < 65.0 {
                prop_assert_eq!(hypotension.len(), 1);
                prop_assert_eq!(hypotension[0].severity, Severity::High);
            } else {
                prop_assert!(hypotension.is_empty());
            }
        }
    }
}
