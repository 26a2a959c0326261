//! API route definitions.
//!
//! Every response uses the `{ "data": ..., "meta": ... }` envelope. Pool
//! work runs under `spawn_blocking` so SQLite never stalls the runtime.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use super::ApiError;
use crate::fleet::workshop::AnomalyFilter;
use crate::fleet::{inventory, NewAnomaly, NewConformity};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/dashboard", get(dashboard))
        .route("/trains", get(list_trains))
        .route("/trains/recalc", post(recalc_all))
        .route("/trains/{id}", get(train_detail))
        .route("/trains/{id}/recalc", post(recalc_train))
        .route("/anomalies", get(list_anomalies).post(create_anomaly))
        .route("/anomalies/{id}/start", post(start_anomaly))
        .route("/anomalies/{id}/resolve", post(resolve_anomaly))
        .route("/conformities", post(create_conformity))
        .route("/parts", get(list_parts))
        .route("/parts/{ref}", put(update_part))
}

/// Run a closure against the blocking pool and surface its result.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f)
        .await
        .map_err(anyhow::Error::from)??)
}

fn envelope(data: impl serde::Serialize, meta: Value) -> Json<Value> {
    let mut meta = meta;
    if let Value::Object(map) = &mut meta {
        map.insert(
            "timestamp".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
    }
    Json(json!({ "data": data, "meta": meta }))
}

async fn health() -> Json<Value> {
    envelope(
        json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
        json!({ "version": env!("CARGO_PKG_VERSION") }),
    )
}

async fn list_trains(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let trains = blocking(move || workshop.list_trains()).await?;
    let total = trains.len();
    Ok(envelope(trains, json!({ "total": total })))
}

async fn train_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let detail = blocking(move || workshop.train_detail(&id)).await?;
    Ok(envelope(detail, json!({})))
}

async fn recalc_train(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let health = blocking(move || workshop.aggregator().recompute(&id)).await?;
    Ok(envelope(json!({ "health": health }), json!({})))
}

async fn recalc_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let results = blocking(move || workshop.aggregator().recompute_all()).await?;
    let total = results.len();
    Ok(envelope(
        results
            .into_iter()
            .map(|(id, health)| json!({ "train_id": id, "health": health }))
            .collect::<Vec<_>>(),
        json!({ "total": total }),
    ))
}

async fn list_anomalies(
    State(state): State<AppState>,
    Query(filter): Query<AnomalyFilter>,
) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let anomalies = blocking(move || workshop.list_anomalies(&filter, 200)).await?;
    let total = anomalies.len();
    Ok(envelope(anomalies, json!({ "total": total })))
}

async fn create_anomaly(
    State(state): State<AppState>,
    Json(input): Json<NewAnomaly>,
) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let (anomaly, health) = blocking(move || workshop.report_anomaly(input)).await?;
    Ok(envelope(anomaly, json!({ "train_health": health })))
}

async fn start_anomaly(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    blocking(move || workshop.start_anomaly(id)).await?;
    Ok(envelope(json!({ "id": id, "status": "in_progress" }), json!({})))
}

async fn resolve_anomaly(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let health = blocking(move || workshop.resolve_anomaly(id)).await?;
    Ok(envelope(
        json!({ "id": id, "status": "resolved" }),
        json!({ "train_health": health }),
    ))
}

async fn create_conformity(
    State(state): State<AppState>,
    Json(input): Json<NewConformity>,
) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let (conformity, health) = blocking(move || workshop.record_conformity(input)).await?;
    Ok(envelope(conformity, json!({ "train_health": health })))
}

async fn list_parts(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let pool = state.pool.clone();
    let (parts, low) = blocking(move || {
        let parts = inventory::list(&pool)?;
        let low: Vec<String> = parts
            .iter()
            .filter(|p| p.is_low_stock())
            .map(|p| p.r#ref.clone())
            .collect();
        Ok((parts, low))
    })
    .await?;
    let total = parts.len();
    Ok(envelope(parts, json!({ "total": total, "low_stock": low })))
}

#[derive(Deserialize)]
struct PartUpdate {
    quantity: i64,
}

async fn update_part(
    State(state): State<AppState>,
    Path(part_ref): Path<String>,
    Json(update): Json<PartUpdate>,
) -> Result<Json<Value>, ApiError> {
    let pool = state.pool.clone();
    let part = blocking(move || inventory::set_quantity(&pool, &part_ref, update.quantity)).await?;
    Ok(envelope(part, json!({})))
}

/// Manager dashboard: refresh every train's health first, like the original
/// dashboard page, then report the KPIs.
async fn dashboard(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let workshop = state.workshop.clone();
    let summary = blocking(move || {
        workshop.aggregator().recompute_all()?;
        workshop.fleet_summary()
    })
    .await?;
    Ok(envelope(summary, json!({})))
}
