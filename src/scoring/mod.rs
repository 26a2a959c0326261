//! Criticality and health scoring engine.
//!
//! Two engines, both pure computation over the anomaly history:
//! [`criticality::CriticalityCalculator`] scores a single anomaly at report
//! time, [`health::HealthAggregator`] folds a train's recent anomalies into
//! its 0-100 health figure. Soft fallbacks (unknown component, unknown
//! severity) are deliberate: scoring never rejects a report, it only
//! degrades to documented defaults. Storage errors still propagate.

pub mod criticality;
pub mod health;
pub mod window;

use serde::{Deserialize, Serialize};

/// Criticality ceiling assumed for components missing from the catalog.
pub const DEFAULT_MAX_CRITICALITY: u8 = 50;

/// Frequency/immobilization interaction factor for a train still in service.
/// An immobilizing fault gets the full factor of 1.0.
pub const IN_SERVICE_FACTOR: f64 = 0.6;

/// Tunable scoring weights and window. Defaults match the AMDEC model the
/// depot validated; override via the `[scoring]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Trailing lookback, in days, for both frequency counting and health.
    pub window_days: i64,
    /// Occurrence count at which the frequency factor saturates at 1.0.
    pub frequency_saturation: u32,
    /// Share of the component ceiling every anomaly carries regardless of
    /// severity or recurrence.
    pub baseline_weight: f64,
    /// Share driven by the reported severity tier alone.
    pub severity_weight: f64,
    /// Share driven by the frequency x immobilization interaction.
    pub frequency_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            frequency_saturation: 5,
            baseline_weight: 0.5,
            severity_weight: 0.3,
            frequency_weight: 0.2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let cfg = ScoringConfig::default();
        let total = cfg.baseline_weight + cfg.severity_weight + cfg.frequency_weight;
        assert!((total - 1.0).abs() < f64::EPSILON);
    }
}
