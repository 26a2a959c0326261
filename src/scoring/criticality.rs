//! Per-anomaly criticality scoring.
//!
//! `score = ceiling * (0.5 + 0.3*severity + 0.2*frequency*immobilization)`
//! where the ceiling comes from the AMDEC component catalog, severity from
//! the technician's reported tier, frequency from how often the same
//! (train, component) pair failed in the trailing window, and the
//! immobilization factor from whether the fault took the train out of
//! service. The result is rounded and clamped to 0-100.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::fleet::Severity;
use crate::scoring::{window, ScoringConfig, DEFAULT_MAX_CRITICALITY, IN_SERVICE_FACTOR};
use crate::storage::Pool;

pub struct CriticalityCalculator {
    pool: Pool,
    cfg: ScoringConfig,
}

impl CriticalityCalculator {
    pub fn new(pool: Pool, cfg: ScoringConfig) -> Self {
        Self { pool, cfg }
    }

    /// Score an anomaly about to be reported. Pure read + compute: the
    /// caller persists the result. Must run before the new row is inserted
    /// so the occurrence count covers prior reports only.
    pub fn compute(
        &self,
        train_id: &str,
        component: &str,
        severity: Severity,
        immobilization: bool,
    ) -> Result<u8> {
        self.compute_at(train_id, component, severity, immobilization, Utc::now())
    }

    /// Same as [`compute`](Self::compute) with an explicit evaluation
    /// instant, so tests control the window.
    pub fn compute_at(
        &self,
        train_id: &str,
        component: &str,
        severity: Severity,
        immobilization: bool,
        now: DateTime<Utc>,
    ) -> Result<u8> {
        let conn = self.pool.get()?;
        let ceiling = component_ceiling(&conn, component)?;
        let since = window::start(now, self.cfg.window_days);
        let occurrences = occurrences_since(&conn, train_id, component, since)?;

        let value = score(ceiling, severity, occurrences, immobilization, &self.cfg);
        debug!(
            train_id,
            component,
            severity = severity.as_str(),
            immobilization,
            occurrences,
            score = value,
            "computed anomaly criticality"
        );
        Ok(value)
    }
}

/// AMDEC ceiling for a component, falling back to the documented baseline
/// when the component is not in the catalog. Never errors on unknown names.
pub fn component_ceiling(conn: &Connection, component: &str) -> Result<u8> {
    let ceiling: Option<i64> = conn
        .query_row(
            "SELECT max_criticality FROM components WHERE name = ?1",
            [component],
            |row| row.get(0),
        )
        .optional()?;
    Ok(ceiling
        .map(|v| v.clamp(0, 100) as u8)
        .unwrap_or(DEFAULT_MAX_CRITICALITY))
}

/// Prior reports for the same (train, component) pair inside the window.
pub fn occurrences_since(
    conn: &Connection,
    train_id: &str,
    component: &str,
    since: DateTime<Utc>,
) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM anomalies
         WHERE train_id = ?1 AND component = ?2 AND reported_at >= ?3",
        rusqlite::params![train_id, component, since.to_rfc3339()],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

/// Recurrence factor: linear in the occurrence count, saturating at 1.0 once
/// `saturation` prior reports exist in the window.
pub fn frequency_factor(occurrences: u32, saturation: u32) -> f64 {
    if saturation == 0 {
        return 1.0;
    }
    (occurrences as f64 / saturation as f64).min(1.0)
}

/// The weighted-sum formula itself: pure, so the property tests can sweep it.
pub fn score(
    ceiling: u8,
    severity: Severity,
    occurrences: u32,
    immobilization: bool,
    cfg: &ScoringConfig,
) -> u8 {
    let freq = frequency_factor(occurrences, cfg.frequency_saturation);
    let imm = if immobilization { 1.0 } else { IN_SERVICE_FACTOR };
    let raw = ceiling as f64
        * (cfg.baseline_weight
            + cfg.severity_weight * severity.multiplier()
            + cfg.frequency_weight * freq * imm);
    raw.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage;

    fn pool() -> (Pool, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("railwatch.db");
        (storage::open_pool(path.to_str().unwrap()).unwrap(), dir)
    }

    #[test]
    fn test_frequency_factor_exact_points() {
        assert_eq!(frequency_factor(0, 5), 0.0);
        assert_eq!(frequency_factor(1, 5), 0.2);
        assert_eq!(frequency_factor(4, 5), 0.8);
        assert_eq!(frequency_factor(5, 5), 1.0);
        assert_eq!(frequency_factor(6, 5), 1.0);
        assert_eq!(frequency_factor(50, 5), 1.0);
    }

    #[test]
    fn test_frequency_factor_monotone() {
        let mut last = 0.0;
        for occ in 0..20 {
            let f = frequency_factor(occ, 5);
            assert!(f >= last);
            last = f;
        }
    }

    #[test]
    fn test_brake_urgent_immobilized_first_report() {
        // 95 * (0.5 + 0.3*1.0 + 0.2*0*1.0) = 95 * 0.8 = 76
        let cfg = ScoringConfig::default();
        assert_eq!(score(95, Severity::Urgent, 0, true, &cfg), 76);
    }

    #[test]
    fn test_brake_faible_saturated_in_service() {
        // 95 * (0.5 + 0.3*0.3 + 0.2*1.0*0.6) = 95 * 0.71 = 67.45 -> 67
        let cfg = ScoringConfig::default();
        assert_eq!(score(95, Severity::Faible, 6, false, &cfg), 67);
    }

    #[test]
    fn test_score_always_in_bounds() {
        let cfg = ScoringConfig::default();
        for ceiling in [0u8, 50, 100] {
            for severity in [Severity::Urgent, Severity::Moyen, Severity::Faible] {
                for immobilization in [true, false] {
                    for occ in [0u32, 5, 50] {
                        let s = score(ceiling, severity, occ, immobilization, &cfg);
                        assert!(s <= 100, "score {s} out of bounds");
                    }
                }
            }
        }
    }

    #[test]
    fn test_unknown_component_uses_baseline_ceiling() {
        let (p, _dir) = pool();
        let conn = p.get().unwrap();
        assert_eq!(
            component_ceiling(&conn, "suspension-magnetique").unwrap(),
            DEFAULT_MAX_CRITICALITY
        );
        assert_eq!(component_ceiling(&conn, "frein").unwrap(), 95);
    }

    #[test]
    fn test_unknown_severity_scores_like_moyen() {
        let cfg = ScoringConfig::default();
        let unknown = Severity::from_label("n'importe quoi");
        assert_eq!(
            score(80, unknown, 2, false, &cfg),
            score(80, Severity::Moyen, 2, false, &cfg)
        );
    }

    #[test]
    fn test_occurrence_count_respects_window() {
        use chrono::{Duration, TimeZone, Utc};

        let (p, _dir) = pool();
        let conn = p.get().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let insert = |reported_at: chrono::DateTime<Utc>| {
            conn.execute(
                "INSERT INTO anomalies (train_id, technician, reported_at, category, component,
                    severity, calculated_criticality, urgency, status)
                 VALUES ('Z2M-01', 'tech', ?1, 'mecanique', 'frein', 'Moyen', 60, 'moyenne', 'to_treat')",
                [reported_at.to_rfc3339()],
            )
            .unwrap();
        };
        insert(now - Duration::days(10));
        insert(now - Duration::days(89));
        insert(now - Duration::days(91)); // outside the window

        let since = window::start(now, 90);
        assert_eq!(occurrences_since(&conn, "Z2M-01", "frein", since).unwrap(), 2);
        assert_eq!(occurrences_since(&conn, "Z2M-01", "porte", since).unwrap(), 0);
        assert_eq!(occurrences_since(&conn, "Z2M-05", "frein", since).unwrap(), 0);
    }
}
