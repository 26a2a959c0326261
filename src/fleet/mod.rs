//! Fleet domain model -- trains, anomalies, conformity reports, parts.

pub mod inventory;
pub mod workshop;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("train '{0}' not found")]
    TrainNotFound(String),
    #[error("anomaly #{0} not found")]
    AnomalyNotFound(i64),
    #[error("part '{0}' not found")]
    PartNotFound(String),
}

/// Severity tier reported by the technician.
///
/// Parsing is soft on purpose: a label the catalog does not know scores like
/// `Moyen` rather than rejecting the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Urgent,
    Moyen,
    Faible,
}

impl Severity {
    /// Map a free-text label to a tier. Unknown labels fall back to `Moyen`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Urgent" => Severity::Urgent,
            "Faible" => Severity::Faible,
            _ => Severity::Moyen,
        }
    }

    /// Weight applied to the component ceiling in the criticality formula.
    pub fn multiplier(self) -> f64 {
        match self {
            Severity::Urgent => 1.0,
            Severity::Moyen => 0.6,
            Severity::Faible => 0.3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Urgent => "Urgent",
            Severity::Moyen => "Moyen",
            Severity::Faible => "Faible",
        }
    }
}

/// Urgency label derived from the calculated criticality at report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Critique,
    Moyenne,
    Faible,
}

impl Urgency {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            Urgency::Critique
        } else if score >= 50 {
            Urgency::Moyenne
        } else {
            Urgency::Faible
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Urgency::Critique => "critique",
            Urgency::Moyenne => "moyenne",
            Urgency::Faible => "faible",
        }
    }
}

/// Lifecycle of an anomaly record. Records are never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    ToTreat,
    InProgress,
    Resolved,
}

impl AnomalyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyStatus::ToTreat => "to_treat",
            AnomalyStatus::InProgress => "in_progress",
            AnomalyStatus::Resolved => "resolved",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "in_progress" => AnomalyStatus::InProgress,
            "resolved" => AnomalyStatus::Resolved,
            _ => AnomalyStatus::ToTreat,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Train {
    pub id: String,
    pub model: String,
    pub commissioned_on: String,
    pub km_total: i64,
    pub health: u8,
    pub last_inspection: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub id: i64,
    pub train_id: String,
    pub technician: String,
    pub reported_at: DateTime<Utc>,
    pub category: String,
    pub component: String,
    pub description: String,
    pub immobilization: bool,
    pub severity: Severity,
    pub calculated_criticality: u8,
    pub urgency: Urgency,
    pub status: AnomalyStatus,
}

/// Fields a technician submits when declaring an anomaly; everything derived
/// (criticality, urgency, status, timestamp) is filled in by the workshop.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAnomaly {
    pub train_id: String,
    pub technician: String,
    pub category: String,
    pub component: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub immobilization: bool,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conformity {
    pub id: i64,
    pub train_id: String,
    pub performed_at: DateTime<Utc>,
    pub technician: String,
    pub intervention_type: String,
    pub component: String,
    pub part_ref: Option<String>,
    pub result: String,
    pub observations: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewConformity {
    pub train_id: String,
    pub technician: String,
    pub intervention_type: String,
    pub component: String,
    #[serde(default)]
    pub part_ref: Option<String>,
    pub result: String,
    #[serde(default)]
    pub observations: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub r#ref: String,
    pub designation: String,
    pub quantity: i64,
    pub min_threshold: i64,
    pub used_on: String,
}

impl Part {
    /// Below (strictly) the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.min_threshold
    }
}
