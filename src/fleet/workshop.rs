//! Write-path orchestration and read queries for the maintenance log.
//!
//! Every path that touches the anomaly history ends in the health
//! aggregator; nothing else writes `trains.health`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::Serialize;
use tracing::info;

use crate::fleet::{
    inventory, Anomaly, AnomalyStatus, Conformity, FleetError, NewAnomaly, NewConformity,
    Severity, Train, Urgency,
};
use crate::scoring::criticality::CriticalityCalculator;
use crate::scoring::health::HealthAggregator;
use crate::scoring::{window, ScoringConfig};
use crate::storage::Pool;

/// Optional filters for the anomaly list (manager view).
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AnomalyFilter {
    pub urgency: Option<String>,
    pub category: Option<String>,
    pub technician: Option<String>,
}

/// Manager dashboard KPIs.
#[derive(Debug, Serialize)]
pub struct FleetSummary {
    pub trains_total: usize,
    /// health < 50
    pub trains_bad: usize,
    /// 50 <= health < 80
    pub trains_medium: usize,
    /// health >= 80
    pub trains_good: usize,
    pub anomalies_total: usize,
    pub anomalies_open: usize,
    pub anomalies_by_category: Vec<(String, i64)>,
}

/// Per-train detail: the train plus its windowed history.
#[derive(Debug, Serialize)]
pub struct TrainDetail {
    pub train: Train,
    pub anomalies: Vec<Anomaly>,
    pub conformities: Vec<Conformity>,
}

pub struct Workshop {
    pool: Pool,
    cfg: ScoringConfig,
    calculator: CriticalityCalculator,
    aggregator: HealthAggregator,
}

impl Workshop {
    pub fn new(pool: Pool, cfg: ScoringConfig) -> Self {
        let calculator = CriticalityCalculator::new(pool.clone(), cfg.clone());
        let aggregator = HealthAggregator::new(pool.clone(), cfg.clone());
        Self {
            pool,
            cfg,
            calculator,
            aggregator,
        }
    }

    pub fn aggregator(&self) -> &HealthAggregator {
        &self.aggregator
    }

    pub fn calculator(&self) -> &CriticalityCalculator {
        &self.calculator
    }

    /// Record a technician's anomaly report: score it, derive the urgency
    /// label, insert with status `to_treat`, then refresh the train's
    /// health. The criticality is computed before the insert so the
    /// occurrence count covers prior reports only, and it is frozen at this
    /// value for the life of the record.
    pub fn report_anomaly(&self, input: NewAnomaly) -> Result<(Anomaly, u8)> {
        self.report_anomaly_at(input, Utc::now())
    }

    pub fn report_anomaly_at(&self, input: NewAnomaly, now: DateTime<Utc>) -> Result<(Anomaly, u8)> {
        self.ensure_train(&input.train_id)?;

        let severity = Severity::from_label(&input.severity);
        let immobilization = input.immobilization;
        let criticality =
            self.calculator
                .compute_at(&input.train_id, &input.component, severity, immobilization, now)?;
        let urgency = Urgency::from_score(criticality);

        let id = {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO anomalies (train_id, technician, reported_at, category, component,
                    description, immobilization, severity, calculated_criticality, urgency, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    input.train_id,
                    input.technician,
                    now.to_rfc3339(),
                    input.category,
                    input.component,
                    input.description,
                    immobilization as i64,
                    severity.as_str(),
                    criticality,
                    urgency.as_str(),
                    AnomalyStatus::ToTreat.as_str(),
                ],
            )?;
            conn.last_insert_rowid()
        };

        let health = self.aggregator.recompute_at(&input.train_id, now)?;
        info!(
            anomaly = id,
            train_id = %input.train_id,
            component = %input.component,
            criticality,
            urgency = urgency.as_str(),
            health,
            "anomaly reported"
        );

        let anomaly = Anomaly {
            id,
            train_id: input.train_id,
            technician: input.technician,
            reported_at: now,
            category: input.category,
            component: input.component,
            description: input.description,
            immobilization,
            severity,
            calculated_criticality: criticality,
            urgency,
            status: AnomalyStatus::ToTreat,
        };
        Ok((anomaly, health))
    }

    /// Mark an anomaly as being worked on. No health impact.
    pub fn start_anomaly(&self, id: i64) -> Result<()> {
        self.set_status(id, AnomalyStatus::InProgress)?;
        Ok(())
    }

    /// Close an anomaly and refresh its train's health.
    pub fn resolve_anomaly(&self, id: i64) -> Result<u8> {
        self.resolve_anomaly_at(id, Utc::now())
    }

    pub fn resolve_anomaly_at(&self, id: i64, now: DateTime<Utc>) -> Result<u8> {
        let train_id = self.set_status(id, AnomalyStatus::Resolved)?;
        let health = self.aggregator.recompute_at(&train_id, now)?;
        info!(anomaly = id, train_id = %train_id, health, "anomaly resolved");
        Ok(health)
    }

    /// Record a post-intervention conformity report. A replaced part
    /// decrements inventory by one; the train's health is refreshed either
    /// way.
    pub fn record_conformity(&self, input: NewConformity) -> Result<(Conformity, u8)> {
        self.record_conformity_at(input, Utc::now())
    }

    pub fn record_conformity_at(
        &self,
        input: NewConformity,
        now: DateTime<Utc>,
    ) -> Result<(Conformity, u8)> {
        self.ensure_train(&input.train_id)?;

        let part_ref = input.part_ref.filter(|r| !r.is_empty());
        let id = {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO conformities (train_id, performed_at, technician, intervention_type,
                    component, part_ref, result, observations)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    input.train_id,
                    now.to_rfc3339(),
                    input.technician,
                    input.intervention_type,
                    input.component,
                    part_ref,
                    input.result,
                    input.observations,
                ],
            )?;
            conn.last_insert_rowid()
        };

        if let Some(part) = &part_ref {
            inventory::consume(&self.pool, part)?;
        }

        let health = self.aggregator.recompute_at(&input.train_id, now)?;
        info!(
            conformity = id,
            train_id = %input.train_id,
            part_ref = part_ref.as_deref().unwrap_or("-"),
            health,
            "conformity recorded"
        );

        let conformity = Conformity {
            id,
            train_id: input.train_id,
            performed_at: now,
            technician: input.technician,
            intervention_type: input.intervention_type,
            component: input.component,
            part_ref,
            result: input.result,
            observations: input.observations,
        };
        Ok((conformity, health))
    }

    pub fn list_trains(&self) -> Result<Vec<Train>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, model, commissioned_on, km_total, health, last_inspection
             FROM trains ORDER BY id",
        )?;
        let rows = stmt.query_map([], train_from_row)?;
        let mut trains = Vec::new();
        for row in rows {
            trains.push(row?);
        }
        Ok(trains)
    }

    pub fn train_detail(&self, train_id: &str) -> Result<TrainDetail> {
        self.train_detail_at(train_id, Utc::now())
    }

    /// Train plus its anomaly and conformity history inside the scoring
    /// window.
    pub fn train_detail_at(&self, train_id: &str, now: DateTime<Utc>) -> Result<TrainDetail> {
        let conn = self.pool.get()?;
        let train = conn
            .query_row(
                "SELECT id, model, commissioned_on, km_total, health, last_inspection
                 FROM trains WHERE id = ?1",
                [train_id],
                train_from_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    anyhow::Error::from(FleetError::TrainNotFound(train_id.to_string()))
                }
                other => other.into(),
            })?;

        let since = window::start(now, self.cfg.window_days).to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT id, train_id, technician, reported_at, category, component, description,
                    immobilization, severity, calculated_criticality, urgency, status
             FROM anomalies WHERE train_id = ?1 AND reported_at >= ?2
             ORDER BY reported_at DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![train_id, since], anomaly_from_row)?;
        let mut anomalies = Vec::new();
        for row in rows {
            anomalies.push(row?);
        }

        let mut stmt = conn.prepare(
            "SELECT id, train_id, performed_at, technician, intervention_type, component,
                    part_ref, result, observations
             FROM conformities WHERE train_id = ?1 ORDER BY performed_at DESC",
        )?;
        let rows = stmt.query_map([train_id], conformity_from_row)?;
        let mut conformities = Vec::new();
        for row in rows {
            conformities.push(row?);
        }

        Ok(TrainDetail {
            train,
            anomalies,
            conformities,
        })
    }

    pub fn list_anomalies(&self, filter: &AnomalyFilter, limit: usize) -> Result<Vec<Anomaly>> {
        let conn = self.pool.get()?;
        let mut sql = String::from(
            "SELECT id, train_id, technician, reported_at, category, component, description,
                    immobilization, severity, calculated_criticality, urgency, status
             FROM anomalies WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(urgency) = &filter.urgency {
            sql.push_str(&format!(" AND urgency = ?{}", params.len() + 1));
            params.push(Box::new(urgency.clone()));
        }
        if let Some(category) = &filter.category {
            sql.push_str(&format!(" AND category = ?{}", params.len() + 1));
            params.push(Box::new(category.clone()));
        }
        if let Some(technician) = &filter.technician {
            sql.push_str(&format!(" AND technician = ?{}", params.len() + 1));
            params.push(Box::new(technician.clone()));
        }
        sql.push_str(&format!(" ORDER BY reported_at DESC LIMIT ?{}", params.len() + 1));
        params.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), anomaly_from_row)?;
        let mut anomalies = Vec::new();
        for row in rows {
            anomalies.push(row?);
        }
        Ok(anomalies)
    }

    /// Manager KPIs over the whole fleet. Callers wanting fresh numbers run
    /// the batch recompute first (the dashboard handler does).
    pub fn fleet_summary(&self) -> Result<FleetSummary> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare("SELECT health FROM trains")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let (mut total, mut bad, mut medium, mut good) = (0usize, 0usize, 0usize, 0usize);
        for row in rows {
            let health = row?;
            total += 1;
            if health < 50 {
                bad += 1;
            } else if health < 80 {
                medium += 1;
            } else {
                good += 1;
            }
        }

        let anomalies_total: i64 =
            conn.query_row("SELECT COUNT(*) FROM anomalies", [], |row| row.get(0))?;
        let anomalies_open: i64 = conn.query_row(
            "SELECT COUNT(*) FROM anomalies WHERE status != 'resolved'",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT category, COUNT(*) FROM anomalies GROUP BY category ORDER BY COUNT(*) DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut by_category = Vec::new();
        for row in rows {
            by_category.push(row?);
        }

        Ok(FleetSummary {
            trains_total: total,
            trains_bad: bad,
            trains_medium: medium,
            trains_good: good,
            anomalies_total: anomalies_total as usize,
            anomalies_open: anomalies_open as usize,
            anomalies_by_category: by_category,
        })
    }

    fn ensure_train(&self, train_id: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trains WHERE id = ?1",
            [train_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(FleetError::TrainNotFound(train_id.to_string()).into());
        }
        Ok(())
    }

    /// Update an anomaly's status, returning its train id.
    fn set_status(&self, id: i64, status: AnomalyStatus) -> Result<String> {
        let conn = self.pool.get()?;
        let train_id: String = conn
            .query_row(
                "SELECT train_id FROM anomalies WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    anyhow::Error::from(FleetError::AnomalyNotFound(id))
                }
                other => other.into(),
            })?;
        conn.execute(
            "UPDATE anomalies SET status = ?1 WHERE id = ?2",
            rusqlite::params![status.as_str(), id],
        )?;
        Ok(train_id)
    }
}

fn train_from_row(row: &Row<'_>) -> rusqlite::Result<Train> {
    Ok(Train {
        id: row.get(0)?,
        model: row.get(1)?,
        commissioned_on: row.get(2)?,
        km_total: row.get(3)?,
        health: row.get::<_, i64>(4)?.clamp(0, 100) as u8,
        last_inspection: row.get(5)?,
    })
}

fn anomaly_from_row(row: &Row<'_>) -> rusqlite::Result<Anomaly> {
    let reported_at: String = row.get(3)?;
    let severity: String = row.get(8)?;
    let criticality: u8 = row.get::<_, i64>(9)?.clamp(0, 100) as u8;
    let status: String = row.get(11)?;
    Ok(Anomaly {
        id: row.get(0)?,
        train_id: row.get(1)?,
        technician: row.get(2)?,
        reported_at: chrono::DateTime::parse_from_rfc3339(&reported_at)
            .unwrap_or_default()
            .with_timezone(&Utc),
        category: row.get(4)?,
        component: row.get(5)?,
        description: row.get(6)?,
        immobilization: row.get::<_, i64>(7)? != 0,
        severity: Severity::from_label(&severity),
        calculated_criticality: criticality,
        urgency: Urgency::from_score(criticality),
        status: AnomalyStatus::from_str(&status),
    })
}

fn conformity_from_row(row: &Row<'_>) -> rusqlite::Result<Conformity> {
    let performed_at: String = row.get(2)?;
    Ok(Conformity {
        id: row.get(0)?,
        train_id: row.get(1)?,
        performed_at: chrono::DateTime::parse_from_rfc3339(&performed_at)
            .unwrap_or_default()
            .with_timezone(&Utc),
        technician: row.get(3)?,
        intervention_type: row.get(4)?,
        component: row.get(5)?,
        part_ref: row.get(6)?,
        result: row.get(7)?,
        observations: row.get(8)?,
    })
}
