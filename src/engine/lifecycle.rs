//! Trip-level transitions, orchestrated across the board, the presence
//! registry, the notification inbox, and the event stream. The state
//! machine itself is flat: Seeking -> Matched -> Confirmed, with reject
//! looping back to Seeking and Cancelled as the terminal state.

use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::Place;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::trip::{PartyResponse, RideOffer};
use crate::state::AppState;

pub fn post_offer(
    state: &AppState,
    rider_id: Uuid,
    origin: Place,
    destination: Place,
) -> Result<RideOffer, AppError> {
    let offer = state.board.post(rider_id, origin, destination)?;

    state.metrics.offers_posted_total.inc();
    refresh_open_gauge(state);
    let _ = state.trip_events_tx.send(offer.clone());
    info!(trip_id = %offer.trip_id, rider_id = %rider_id, "ride request posted");
    Ok(offer)
}

pub fn withdraw_offer(
    state: &AppState,
    trip_id: Uuid,
    rider_id: Uuid,
) -> Result<RideOffer, AppError> {
    let offer = state.board.withdraw(trip_id, rider_id)?;

    if let Some(driver_id) = offer.matched_driver_id {
        state.inbox.push(Notification::new(
            driver_id,
            NotificationKind::TripCancelled,
            Some(trip_id),
            "Ride request withdrawn by rider",
            None,
        ));
    }

    state.metrics.trips_cancelled_total.inc();
    refresh_open_gauge(state);
    let _ = state.trip_events_tx.send(offer.clone());
    info!(trip_id = %trip_id, rider_id = %rider_id, "ride request withdrawn");
    Ok(offer)
}

pub fn respond_as_driver(
    state: &AppState,
    trip_id: Uuid,
    driver_id: Uuid,
    response: PartyResponse,
) -> Result<RideOffer, AppError> {
    match response {
        PartyResponse::Pending => Err(AppError::Validation(
            "response must be Accepted or Rejected".to_string(),
        )),
        PartyResponse::Accepted => {
            // Price is captured from the driver's route as declared at
            // accept time, not at posting time.
            let driver = state
                .presence
                .get(driver_id)
                .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;
            let price = driver.route.as_ref().map(|route| route.price_per_ride);

            let offer =
                match state
                    .board
                    .driver_respond(trip_id, driver_id, PartyResponse::Accepted, price)
                {
                    Ok(offer) => offer,
                    Err(err) => {
                        if matches!(err, AppError::Conflict(_)) {
                            state
                                .metrics
                                .trip_responses_total
                                .with_label_values(&["conflict"])
                                .inc();
                        }
                        return Err(err);
                    }
                };

            state
                .metrics
                .trip_responses_total
                .with_label_values(&["accepted"])
                .inc();
            if let Some(matched_at) = offer.matched_at {
                let wait = (matched_at - offer.requested_at).num_milliseconds() as f64 / 1000.0;
                state.metrics.match_wait_seconds.observe(wait.max(0.0));
            }
            refresh_open_gauge(state);

            state.inbox.push(Notification::new(
                offer.rider_id,
                NotificationKind::TripMatched,
                Some(trip_id),
                "A driver accepted your ride request. Confirm to proceed.",
                None,
            ));
            let _ = state.trip_events_tx.send(offer.clone());
            info!(trip_id = %trip_id, driver_id = %driver_id, "ride request accepted");
            Ok(offer)
        }
        PartyResponse::Rejected => {
            let offer =
                state
                    .board
                    .driver_respond(trip_id, driver_id, PartyResponse::Rejected, None)?;

            state
                .metrics
                .trip_responses_total
                .with_label_values(&["rejected"])
                .inc();
            refresh_open_gauge(state);
            let _ = state.trip_events_tx.send(offer.clone());
            info!(trip_id = %trip_id, driver_id = %driver_id, "ride request rejected");
            Ok(offer)
        }
    }
}

pub fn respond_as_rider(
    state: &AppState,
    trip_id: Uuid,
    rider_id: Uuid,
    response: PartyResponse,
) -> Result<RideOffer, AppError> {
    match response {
        PartyResponse::Pending => Err(AppError::Validation(
            "response must be Accepted or Rejected".to_string(),
        )),
        PartyResponse::Accepted => {
            let offer = state
                .board
                .rider_respond(trip_id, rider_id, PartyResponse::Accepted)?;

            if let Some(driver_id) = offer.matched_driver_id {
                state.inbox.push(Notification::new(
                    driver_id,
                    NotificationKind::TripConfirmed,
                    Some(trip_id),
                    "Rider confirmed the trip. Head to the pickup point.",
                    None,
                ));
            }
            let _ = state.trip_events_tx.send(offer.clone());
            info!(trip_id = %trip_id, rider_id = %rider_id, "trip confirmed");
            Ok(offer)
        }
        PartyResponse::Rejected => {
            let offer = state
                .board
                .rider_respond(trip_id, rider_id, PartyResponse::Rejected)?;

            // The offer re-enters the pool.
            refresh_open_gauge(state);
            let _ = state.trip_events_tx.send(offer.clone());
            info!(trip_id = %trip_id, rider_id = %rider_id, "driver match declined");
            Ok(offer)
        }
    }
}

/// Either party may cancel with a non-empty reason; the counterpart is
/// notified. Notification delivery never fails the transition.
pub fn cancel_trip(
    state: &AppState,
    trip_id: Uuid,
    caller_id: Uuid,
    reason: &str,
) -> Result<RideOffer, AppError> {
    if reason.trim().is_empty() {
        return Err(AppError::Validation(
            "cancellation reason is required".to_string(),
        ));
    }

    let offer = state.board.cancel(trip_id, caller_id, reason)?;

    if let Some(counterpart_id) = offer.counterpart_of(caller_id) {
        let cancelled_by = if offer.rider_id == caller_id {
            "rider"
        } else {
            "driver"
        };
        state.inbox.push(Notification::new(
            counterpart_id,
            NotificationKind::TripCancelled,
            Some(trip_id),
            format!("Trip cancelled by {cancelled_by}. Reason: {reason}"),
            Some(reason.to_string()),
        ));
    }

    state.metrics.trips_cancelled_total.inc();
    refresh_open_gauge(state);
    let _ = state.trip_events_tx.send(offer.clone());
    info!(trip_id = %trip_id, caller_id = %caller_id, reason = %reason, "trip cancelled");
    Ok(offer)
}

fn refresh_open_gauge(state: &AppState) {
    state
        .metrics
        .offers_seeking
        .set(state.board.open_count() as i64);
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{cancel_trip, post_offer, respond_as_driver, respond_as_rider};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::driver::{DeclaredRoute, GeoPoint, Place};
    use crate::models::notification::NotificationKind;
    use crate::models::trip::{OfferStatus, PartyResponse};
    use crate::state::AppState;

    fn test_state() -> AppState {
        AppState::new(Config {
            http_port: 0,
            log_level: "info".to_string(),
            event_buffer_size: 16,
            max_deviation_km: 2.0,
            max_search_radius_km: 50.0,
        })
    }

    fn place(name: &str, lat: f64, lng: f64) -> Place {
        Place {
            name: name.to_string(),
            point: GeoPoint { lat, lng },
        }
    }

    fn matched_trip(state: &AppState, rider: Uuid, driver: Uuid) -> Uuid {
        let route = DeclaredRoute {
            origin: place("home", 52.52, 13.405),
            destination: place("office", 52.5, 13.37),
            waypoints: vec![],
            price_per_ride: 11.0,
            set_at: Utc::now(),
        };
        state.presence.set_online(driver, None, Some(route)).unwrap();

        let offer = post_offer(
            state,
            rider,
            place("a", 52.52, 13.405),
            place("b", 52.5, 13.37),
        )
        .unwrap();
        respond_as_driver(state, offer.trip_id, driver, PartyResponse::Accepted).unwrap();
        offer.trip_id
    }

    #[test]
    fn accept_captures_price_from_declared_route() {
        let state = test_state();
        let rider = Uuid::from_u128(1);
        let driver = Uuid::from_u128(10);

        let trip_id = matched_trip(&state, rider, driver);

        let offer = state.board.get(trip_id).unwrap();
        assert_eq!(offer.status, OfferStatus::Matched);
        assert_eq!(offer.price, Some(11.0));

        // Rider learns about the match through the inbox.
        let notifications = state.inbox.list(rider);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::TripMatched);
    }

    #[test]
    fn accept_by_unknown_driver_is_not_found() {
        let state = test_state();
        let rider = Uuid::from_u128(1);
        let offer = post_offer(
            &state,
            rider,
            place("a", 52.52, 13.405),
            place("b", 52.5, 13.37),
        )
        .unwrap();

        let result = respond_as_driver(
            &state,
            offer.trip_id,
            Uuid::from_u128(10),
            PartyResponse::Accepted,
        );
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn cancellation_requires_a_reason() {
        let state = test_state();
        let rider = Uuid::from_u128(1);
        let driver = Uuid::from_u128(10);
        let trip_id = matched_trip(&state, rider, driver);

        let result = cancel_trip(&state, trip_id, rider, "   ");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn strangers_cannot_cancel() {
        let state = test_state();
        let rider = Uuid::from_u128(1);
        let driver = Uuid::from_u128(10);
        let trip_id = matched_trip(&state, rider, driver);

        let result = cancel_trip(&state, trip_id, Uuid::from_u128(99), "not my trip");
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn cancellation_notifies_the_counterpart_with_the_reason() {
        let state = test_state();
        let rider = Uuid::from_u128(1);
        let driver = Uuid::from_u128(10);
        let trip_id = matched_trip(&state, rider, driver);

        cancel_trip(&state, trip_id, driver, "flat tire").unwrap();

        let notifications = state.inbox.list(rider);
        let cancelled: Vec<_> = notifications
            .iter()
            .filter(|n| n.kind == NotificationKind::TripCancelled)
            .collect();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].reason.as_deref(), Some("flat tire"));
        assert_eq!(cancelled[0].trip_id, Some(trip_id));
    }

    #[test]
    fn confirmed_trip_can_still_be_cancelled() {
        let state = test_state();
        let rider = Uuid::from_u128(1);
        let driver = Uuid::from_u128(10);
        let trip_id = matched_trip(&state, rider, driver);

        respond_as_rider(&state, trip_id, rider, PartyResponse::Accepted).unwrap();
        assert_eq!(
            state.board.get(trip_id).unwrap().status,
            OfferStatus::Confirmed
        );

        let cancelled = cancel_trip(&state, trip_id, rider, "plans changed").unwrap();
        assert_eq!(cancelled.status, OfferStatus::Cancelled);

        // Terminal: a second cancel conflicts.
        let again = cancel_trip(&state, trip_id, rider, "again");
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[test]
    fn rider_can_post_again_after_cancellation() {
        let state = test_state();
        let rider = Uuid::from_u128(1);
        let driver = Uuid::from_u128(10);
        let trip_id = matched_trip(&state, rider, driver);

        cancel_trip(&state, trip_id, rider, "plans changed").unwrap();
        assert!(
            post_offer(
                &state,
                rider,
                place("a", 52.52, 13.405),
                place("b", 52.5, 13.37),
            )
            .is_ok()
        );
    }
}
