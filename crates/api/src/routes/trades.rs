//! Swap trade endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use common::StreamId;
use domain::{
    AmendTrade, BookTrade, BroadcastRelay, CancelTrade, SwapLeg, TradeAmendment, TradeBooking,
    TradeRow, TradeStore,
};
use event_store::EventStore;
use projections::ProjectionEngine;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub trade_store: TradeStore<S>,
    pub event_store: S,
    pub engine: Arc<ProjectionEngine<S>>,
    pub relay: BroadcastRelay,
}

// -- Request types --

#[derive(Deserialize)]
pub struct OwnerQuery {
    #[serde(rename = "bookedBy")]
    pub booked_by: Option<String>,
}

#[derive(Deserialize)]
pub struct PriceRequest {
    /// Seed for the deterministic pricing stub.
    pub seed: u64,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct TradeResponse {
    pub id: String,
    pub counterparty: String,
    pub effective_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub notional_amount: Decimal,
    pub notional_currency: String,
    pub trade_date: NaiveDate,
    pub booked_by: String,
    pub npv: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub leg1: SwapLeg,
    pub leg2: SwapLeg,
}

impl From<TradeRow> for TradeResponse {
    fn from(row: TradeRow) -> Self {
        Self {
            id: row.id.to_string(),
            counterparty: row.counterparty,
            effective_date: row.effective_date,
            maturity_date: row.maturity_date,
            notional_amount: row.notional_amount,
            notional_currency: row.notional_currency,
            trade_date: row.trade_date,
            booked_by: row.booked_by,
            npv: row.npv,
            created_at: row.created_at,
            updated_at: row.updated_at,
            leg1: row.leg1,
            leg2: row.leg2,
        }
    }
}

#[derive(Serialize)]
pub struct PricingResponse {
    pub id: String,
    pub npv: Decimal,
}

#[derive(Serialize)]
pub struct EventEnvelopeResponse {
    pub event_id: String,
    pub event_type: String,
    pub stream_id: String,
    pub version: i64,
    pub timestamp: String,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /swaps?bookedBy= — book a new swap trade.
///
/// The response is synthesized from the command inputs; it does not wait
/// for the projection engine.
#[tracing::instrument(skip(state, booking, owner))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(owner): Query<OwnerQuery>,
    Json(booking): Json<TradeBooking>,
) -> Result<(StatusCode, Json<TradeResponse>), ApiError> {
    let booked_by = require_owner(&owner)?;

    let row = state
        .trade_store
        .create(BookTrade::new(booking, booked_by))
        .await?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

/// GET /swaps?bookedBy= — list the owner's live trades from the read model.
#[tracing::instrument(skip(state, owner))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<Vec<TradeResponse>>, ApiError> {
    let booked_by = require_owner(&owner)?;

    // Fold any not-yet-delivered events first; idempotent alongside the
    // background engine.
    state
        .engine
        .catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let rows = state.trade_store.get_by_owner(&booked_by).await;
    Ok(Json(rows.into_iter().map(TradeResponse::from).collect()))
}

/// GET /swaps/{id} — point lookup; 404 when absent or cancelled.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<TradeResponse>, ApiError> {
    state
        .engine
        .catch_up()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let trade_id = StreamId::new(id);
    let row = state
        .trade_store
        .get_by_id(&trade_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Trade {trade_id} not found")))?;

    Ok(Json(row.into()))
}

/// PUT /swaps/{id}?bookedBy= — partial update of trade terms.
#[tracing::instrument(skip(state, owner, amendment))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Query(owner): Query<OwnerQuery>,
    Json(amendment): Json<TradeAmendment>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let actor = require_owner(&owner)?;
    let trade_id = StreamId::new(id);

    let updated = state
        .trade_store
        .update(AmendTrade::new(trade_id.clone(), amendment, actor))
        .await?;

    if !updated {
        return Err(ApiError::NotFound(format!("Trade {trade_id} not found")));
    }
    Ok(Json(serde_json::json!({ "updated": true })))
}

/// POST /swaps/{id}/price — price via the seeded stub and record the NPV.
#[tracing::instrument(skip(state, req))]
pub async fn price<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<PriceRequest>,
) -> Result<Json<PricingResponse>, ApiError> {
    let trade_id = StreamId::new(id);

    let npv = state
        .trade_store
        .price_with_seed(&trade_id, req.seed)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Trade {trade_id} not found")))?;

    Ok(Json(PricingResponse {
        id: trade_id.to_string(),
        npv,
    }))
}

/// DELETE /swaps/{id} — cancel a trade (soft delete).
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<StatusCode, ApiError> {
    let trade_id = StreamId::new(id);

    let cancelled = state
        .trade_store
        .cancel(CancelTrade::new(trade_id.clone(), req.reason))
        .await?;

    if !cancelled {
        return Err(ApiError::NotFound(format!("Trade {trade_id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /swaps/{id}/events — raw event log for one trade stream.
#[tracing::instrument(skip(state))]
pub async fn events<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventEnvelopeResponse>>, ApiError> {
    let trade_id = StreamId::new(id);

    let envelopes = state
        .event_store
        .read_stream(&trade_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let responses: Vec<EventEnvelopeResponse> = envelopes
        .into_iter()
        .map(|e| EventEnvelopeResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            stream_id: e.stream_id.to_string(),
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        })
        .collect();

    Ok(Json(responses))
}

fn require_owner(owner: &OwnerQuery) -> Result<String, ApiError> {
    match owner.booked_by.as_deref().map(str::trim) {
        Some(booked_by) if !booked_by.is_empty() => Ok(booked_by.to_string()),
        _ => Err(ApiError::BadRequest(
            "bookedBy parameter is required".to_string(),
        )),
    }
}
