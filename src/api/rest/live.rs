use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::live::LiveFix;
use crate::models::driver::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/live/:id/location", post(update_location))
        .route("/trips/:trip_id/live", get(counterpart_location))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct LiveQuery {
    pub caller_id: Uuid,
}

#[derive(Serialize)]
pub struct CounterpartLocationResponse {
    pub subject_id: Uuid,
    pub location: GeoPoint,
    pub updated_at: DateTime<Utc>,
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<LiveFix>, AppError> {
    let fix = state.feed.update(id, payload.location)?;
    Ok(Json(fix))
}

/// The other party's latest position for an ongoing trip. A rider sees
/// the matched driver; the matched driver sees the rider; everyone else
/// is turned away.
async fn counterpart_location(
    State(state): State<Arc<AppState>>,
    Path(trip_id): Path<Uuid>,
    Query(query): Query<LiveQuery>,
) -> Result<Json<CounterpartLocationResponse>, AppError> {
    let trip = state
        .board
        .get(trip_id)
        .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

    if !trip.is_party(query.caller_id) {
        return Err(AppError::Forbidden(
            "you are not a party to this trip".to_string(),
        ));
    }

    let subject_id = trip.counterpart_of(query.caller_id).ok_or_else(|| {
        AppError::NotFound("no driver matched to this trip yet".to_string())
    })?;

    let fix = state.feed.get(subject_id).ok_or_else(|| {
        AppError::NotFound(format!("no live position for {subject_id}"))
    })?;

    Ok(Json(CounterpartLocationResponse {
        subject_id,
        location: fix.point,
        updated_at: fix.updated_at,
    }))
}
