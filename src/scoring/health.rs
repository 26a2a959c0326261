//! Per-train health aggregation.
//!
//! Health is a derived projection of the anomaly history: the average
//! calculated criticality of the trailing window, inverted onto 0-100. The
//! aggregator is the only writer of `trains.health`; anomaly creation,
//! resolution, conformity logging and the dashboard batch refresh all go
//! through it. Note the formula depends on the average only, not the count:
//! one criticality-100 anomaly and ten of them both score health 0. That is
//! a documented property of the validated model, kept as-is.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use tracing::{debug, info};

use crate::fleet::FleetError;
use crate::scoring::{window, ScoringConfig};
use crate::storage::Pool;

pub struct HealthAggregator {
    pool: Pool,
    cfg: ScoringConfig,
}

impl HealthAggregator {
    pub fn new(pool: Pool, cfg: ScoringConfig) -> Self {
        Self { pool, cfg }
    }

    /// Recompute and persist the train's health. Returns the new value.
    pub fn recompute(&self, train_id: &str) -> Result<u8> {
        self.recompute_at(train_id, Utc::now())
    }

    /// Recompute with an explicit evaluation instant (tests inject this).
    ///
    /// The read-aggregate-write runs in one immediate transaction so two
    /// sessions touching the same train cannot interleave a lost update.
    pub fn recompute_at(&self, train_id: &str, now: DateTime<Utc>) -> Result<u8> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let since = window::start(now, self.cfg.window_days);
        let scores: Vec<u8> = {
            let mut stmt = tx.prepare(
                "SELECT calculated_criticality FROM anomalies
                 WHERE train_id = ?1 AND reported_at >= ?2",
            )?;
            let rows = stmt.query_map(
                rusqlite::params![train_id, since.to_rfc3339()],
                |row| row.get::<_, i64>(0),
            )?;
            let mut scores = Vec::new();
            for row in rows {
                scores.push(row?.clamp(0, 100) as u8);
            }
            scores
        };

        let health = health_from_scores(&scores);
        let changed = tx.execute(
            "UPDATE trains SET health = ?1 WHERE id = ?2",
            rusqlite::params![health, train_id],
        )?;
        if changed == 0 {
            return Err(FleetError::TrainNotFound(train_id.to_string()).into());
        }
        tx.commit()?;

        debug!(train_id, anomalies = scores.len(), health, "recomputed train health");
        Ok(health)
    }

    /// Recompute every known train (dashboard refresh, `recalc` subcommand).
    pub fn recompute_all(&self) -> Result<Vec<(String, u8)>> {
        self.recompute_all_at(Utc::now())
    }

    pub fn recompute_all_at(&self, now: DateTime<Utc>) -> Result<Vec<(String, u8)>> {
        let ids: Vec<String> = {
            let conn = self.pool.get()?;
            let mut stmt = conn.prepare("SELECT id FROM trains ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            ids
        };

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let health = self.recompute_at(&id, now)?;
            results.push((id, health));
        }
        info!(trains = results.len(), "fleet health refreshed");
        Ok(results)
    }
}

/// The aggregation formula, pure so tests can sweep it: no anomalies means a
/// fully healthy train; otherwise invert the average criticality.
pub fn health_from_scores(scores: &[u8]) -> u8 {
    if scores.is_empty() {
        return 100;
    }
    let n = scores.len() as f64;
    let sum: f64 = scores.iter().map(|&s| s as f64).sum();
    let fraction = sum / (n * 100.0);
    (100.0 - fraction * 100.0).clamp(0.0, 100.0).round() as u8
}
