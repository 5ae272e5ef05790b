use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::board::{MatchedOffer, NearbyOffer};
use crate::error::AppError;
use crate::geo;
use crate::models::driver::{DeclaredRoute, DriverPresence, GeoPoint, Place};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers/:id/online", post(go_online))
        .route("/drivers/:id/offline", post(go_offline))
        .route("/drivers/:id/location", patch(update_location))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/offers/nearby", get(nearby_offers))
        .route("/drivers/:id/offers/matching", get(matching_offers))
        .route("/trips/:trip_id/nearby-drivers", get(nearby_drivers))
}

#[derive(Deserialize)]
pub struct DeclareRouteRequest {
    pub origin: Place,
    pub destination: Place,
    #[serde(default)]
    pub waypoints: Vec<GeoPoint>,
    #[serde(default)]
    pub price_per_ride: f64,
}

#[derive(Deserialize)]
pub struct GoOnlineRequest {
    pub location: Option<GeoPoint>,
    pub route: Option<DeclareRouteRequest>,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct NearbyParams {
    pub radius_km: Option<f64>,
}

async fn go_online(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GoOnlineRequest>,
) -> Result<Json<DriverPresence>, AppError> {
    let route = payload.route.map(|route| DeclaredRoute {
        origin: route.origin,
        destination: route.destination,
        waypoints: route.waypoints,
        price_per_ride: route.price_per_ride,
        set_at: Utc::now(),
    });

    let presence = state.presence.set_online(id, payload.location, route)?;
    state
        .metrics
        .drivers_online
        .set(state.presence.online_count() as i64);

    tracing::info!(driver_id = %id, has_route = presence.route.is_some(), "driver online");
    Ok(Json(presence))
}

async fn go_offline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverPresence>, AppError> {
    let presence = state.presence.set_offline(id)?;
    state
        .metrics
        .drivers_online
        .set(state.presence.online_count() as i64);

    tracing::info!(driver_id = %id, "driver offline");
    Ok(Json(presence))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<DriverPresence>, AppError> {
    let presence = state.presence.update_location(id, payload.location)?;
    // A position report feeds live tracking too.
    state.feed.update(id, payload.location)?;
    Ok(Json(presence))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DriverPresence>, AppError> {
    let presence = state
        .presence
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;
    Ok(Json(presence))
}

async fn nearby_offers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<NearbyOffer>>, AppError> {
    let radius_km = params
        .radius_km
        .unwrap_or(5.0)
        .clamp(0.0, state.config.max_search_radius_km);

    let nearby = state.board.list_for_driver(&state.presence, id, radius_km)?;
    Ok(Json(nearby))
}

async fn matching_offers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MatchedOffer>>, AppError> {
    let matches =
        state
            .board
            .list_matching_route(&state.presence, id, state.config.max_deviation_km)?;
    Ok(Json(matches))
}

#[derive(Deserialize)]
pub struct NearbyDriversParams {
    pub caller_id: Uuid,
    pub radius_km: Option<f64>,
}

#[derive(Serialize)]
pub struct NearbyDriver {
    pub driver_id: Uuid,
    pub location: GeoPoint,
    pub distance_km: f64,
    pub price_per_ride: f64,
}

/// Online drivers with a declared route near the rider's pickup point.
async fn nearby_drivers(
    State(state): State<Arc<AppState>>,
    Path(trip_id): Path<Uuid>,
    Query(params): Query<NearbyDriversParams>,
) -> Result<Json<Vec<NearbyDriver>>, AppError> {
    let trip = state
        .board
        .get(trip_id)
        .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

    if trip.rider_id != params.caller_id {
        return Err(AppError::Forbidden(
            "you can only view drivers for your own trips".to_string(),
        ));
    }

    let radius_km = params
        .radius_km
        .unwrap_or(1.0)
        .clamp(0.0, state.config.max_search_radius_km);

    let mut drivers: Vec<NearbyDriver> = state
        .presence
        .list_online_with_route()
        .into_iter()
        .filter_map(|presence| {
            let location = presence.location?;
            let route = presence.route.as_ref()?;
            let distance_km = geo::haversine_km(&location, &trip.origin.point);
            (distance_km <= radius_km).then(|| NearbyDriver {
                driver_id: presence.driver_id,
                location,
                distance_km,
                price_per_ride: route.price_per_ride,
            })
        })
        .collect();

    drivers.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(Json(drivers))
}
