use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::driver::Place;
use crate::models::trip::{PartyResponse, RideOffer};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders/:id/offers", post(post_offer))
        .route("/riders/:id/offers/active", get(active_offer))
        .route("/riders/:id/offers/:trip_id", delete(withdraw_offer))
        .route("/trips/:trip_id", get(get_trip))
        .route("/trips/:trip_id/driver-response", post(driver_response))
        .route("/trips/:trip_id/rider-response", post(rider_response))
        .route("/trips/:trip_id/cancel", post(cancel_trip))
}

#[derive(Deserialize)]
pub struct PostOfferRequest {
    pub origin: Place,
    pub destination: Place,
}

#[derive(Deserialize)]
pub struct DriverResponseRequest {
    pub driver_id: Uuid,
    pub response: PartyResponse,
}

#[derive(Deserialize)]
pub struct RiderResponseRequest {
    pub rider_id: Uuid,
    pub response: PartyResponse,
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub caller_id: Uuid,
    pub reason: String,
}

async fn post_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PostOfferRequest>,
) -> Result<Json<RideOffer>, AppError> {
    let offer = lifecycle::post_offer(&state, id, payload.origin, payload.destination)?;
    Ok(Json(offer))
}

async fn active_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideOffer>, AppError> {
    let offer = state
        .board
        .active_for_rider(id)
        .ok_or_else(|| AppError::NotFound(format!("rider {id} has no active ride request")))?;
    Ok(Json(offer))
}

async fn withdraw_offer(
    State(state): State<Arc<AppState>>,
    Path((id, trip_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RideOffer>, AppError> {
    let offer = lifecycle::withdraw_offer(&state, trip_id, id)?;
    Ok(Json(offer))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<RideOffer>, AppError> {
    let offer = state
        .board
        .get(trip_id)
        .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;
    Ok(Json(offer))
}

async fn driver_response(
    State(state): State<Arc<AppState>>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<DriverResponseRequest>,
) -> Result<Json<RideOffer>, AppError> {
    let offer =
        lifecycle::respond_as_driver(&state, trip_id, payload.driver_id, payload.response)?;
    Ok(Json(offer))
}

async fn rider_response(
    State(state): State<Arc<AppState>>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<RiderResponseRequest>,
) -> Result<Json<RideOffer>, AppError> {
    let offer = lifecycle::respond_as_rider(&state, trip_id, payload.rider_id, payload.response)?;
    Ok(Json(offer))
}

async fn cancel_trip(
    State(state): State<Arc<AppState>>,
    Path(trip_id): Path<Uuid>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<RideOffer>, AppError> {
    let offer = lifecycle::cancel_trip(&state, trip_id, payload.caller_id, &payload.reason)?;
    Ok(Json(offer))
}
