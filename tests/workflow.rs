//! End-to-end write-path tests: technician reports flow through the
//! criticality calculator, the anomaly log, and the health aggregator.

use chrono::{Duration, TimeZone, Utc};

use railwatch::fleet::workshop::{AnomalyFilter, Workshop};
use railwatch::fleet::{inventory, FleetError, NewAnomaly, NewConformity};
use railwatch::scoring::ScoringConfig;
use railwatch::storage::{self, Pool};

fn pool() -> (Pool, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("railwatch.db");
    (storage::open_pool(path.to_str().unwrap()).unwrap(), dir)
}

fn brake_report(train_id: &str) -> NewAnomaly {
    NewAnomaly {
        train_id: train_id.to_string(),
        technician: "tech".to_string(),
        category: "mecanique".to_string(),
        component: "frein".to_string(),
        description: "vibration au freinage".to_string(),
        immobilization: true,
        severity: "Urgent".to_string(),
    }
}

#[test]
fn report_scores_and_refreshes_health() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool.clone(), ScoringConfig::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let (anomaly, health) = workshop.report_anomaly_at(brake_report("Z2M-01"), now).unwrap();

    // First brake report: 95 * (0.5 + 0.3) = 76, below the critique line.
    assert_eq!(anomaly.calculated_criticality, 76);
    assert_eq!(anomaly.urgency.as_str(), "moyenne");
    assert_eq!(anomaly.status.as_str(), "to_treat");
    assert_eq!(health, 24);

    let conn = pool.get().unwrap();
    let stored: i64 = conn
        .query_row("SELECT health FROM trains WHERE id = 'Z2M-01'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(stored, 24);
}

#[test]
fn recurrence_raises_criticality() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool, ScoringConfig::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let (first, _) = workshop.report_anomaly_at(brake_report("Z2M-01"), now).unwrap();
    let (second, health) = workshop
        .report_anomaly_at(brake_report("Z2M-01"), now + Duration::days(1))
        .unwrap();

    // Second report sees one prior occurrence: 95 * (0.8 + 0.2*0.2) = 79.8 -> 80.
    assert_eq!(first.calculated_criticality, 76);
    assert_eq!(second.calculated_criticality, 80);
    assert_eq!(second.urgency.as_str(), "critique");
    // Average 78 -> health 22.
    assert_eq!(health, 22);
}

#[test]
fn second_report_does_not_rewrite_first_score() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool.clone(), ScoringConfig::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let (first, _) = workshop.report_anomaly_at(brake_report("Z2M-01"), now).unwrap();
    for day in 1..=4 {
        workshop
            .report_anomaly_at(brake_report("Z2M-01"), now + Duration::days(day))
            .unwrap();
    }

    // The first score is frozen at creation even though the frequency count
    // that fed it has since changed.
    let conn = pool.get().unwrap();
    let stored: i64 = conn
        .query_row(
            "SELECT calculated_criticality FROM anomalies WHERE id = ?1",
            [first.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(stored, 76);
}

#[test]
fn resolution_keeps_window_semantics() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool.clone(), ScoringConfig::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let (anomaly, health_before) = workshop.report_anomaly_at(brake_report("Z2M-01"), now).unwrap();
    let health_after = workshop.resolve_anomaly_at(anomaly.id, now).unwrap();

    // Resolution changes the status and re-runs the aggregator, but a
    // resolved anomaly still counts while inside the trailing window.
    assert_eq!(health_after, health_before);
    let conn = pool.get().unwrap();
    let status: String = conn
        .query_row("SELECT status FROM anomalies WHERE id = ?1", [anomaly.id], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(status, "resolved");
}

#[test]
fn resolving_unknown_anomaly_is_not_found() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool, ScoringConfig::default());
    let err = workshop.resolve_anomaly(9999).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FleetError>(),
        Some(FleetError::AnomalyNotFound(9999))
    ));
}

#[test]
fn reporting_against_unknown_train_is_not_found() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool, ScoringConfig::default());
    let err = workshop.report_anomaly(brake_report("TGV-99")).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FleetError>(),
        Some(FleetError::TrainNotFound(_))
    ));
}

#[test]
fn conformity_consumes_part_and_refreshes_health() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool.clone(), ScoringConfig::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let before = inventory::get(&pool, "PLT10").unwrap().quantity;
    let (conformity, health) = workshop
        .record_conformity_at(
            NewConformity {
                train_id: "Z2M-08".to_string(),
                technician: "tech".to_string(),
                intervention_type: "corrective".to_string(),
                component: "frein".to_string(),
                part_ref: Some("PLT10".to_string()),
                result: "Conforme".to_string(),
                observations: String::new(),
            },
            now,
        )
        .unwrap();

    assert_eq!(conformity.part_ref.as_deref(), Some("PLT10"));
    assert_eq!(inventory::get(&pool, "PLT10").unwrap().quantity, before - 1);
    // No anomalies on Z2M-08: the aggregator reports full health.
    assert_eq!(health, 100);
}

#[test]
fn anomaly_list_filters_by_urgency() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool, ScoringConfig::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    workshop.report_anomaly_at(brake_report("Z2M-01"), now).unwrap();
    let mut mild = brake_report("Z2M-05");
    mild.component = "climatisation".to_string();
    mild.severity = "Faible".to_string();
    mild.immobilization = false;
    workshop.report_anomaly_at(mild, now).unwrap();

    let all = workshop.list_anomalies(&AnomalyFilter::default(), 50).unwrap();
    assert_eq!(all.len(), 2);

    let filter = AnomalyFilter {
        urgency: Some("faible".to_string()),
        ..Default::default()
    };
    let faible = workshop.list_anomalies(&filter, 50).unwrap();
    assert_eq!(faible.len(), 1);
    assert_eq!(faible[0].component, "climatisation");
}

#[test]
fn dashboard_summary_bands_trains() {
    let (pool, _dir) = pool();
    let workshop = Workshop::new(pool, ScoringConfig::default());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    workshop.report_anomaly_at(brake_report("Z2M-01"), now).unwrap();
    workshop.aggregator().recompute_all_at(now).unwrap();

    let summary = workshop.fleet_summary().unwrap();
    assert_eq!(summary.trains_total, 3);
    assert_eq!(summary.trains_bad, 1); // Z2M-01 at 24
    assert_eq!(summary.trains_good, 2);
    assert_eq!(summary.anomalies_open, 1);
    assert_eq!(summary.anomalies_by_category[0].0, "mecanique");
}
