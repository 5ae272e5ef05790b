use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::engine::compat;
use crate::engine::presence::DriverPresenceRegistry;
use crate::error::AppError;
use crate::geo;
use crate::models::driver::Place;
use crate::models::trip::{CancelledBy, OfferStatus, PartyResponse, RideOffer};

/// A seeking offer annotated with its distance from the querying driver.
#[derive(Debug, Clone, Serialize)]
pub struct NearbyOffer {
    pub offer: RideOffer,
    pub distance_km: f64,
}

/// A seeking offer that passed route compatibility, annotated for the
/// dispatch view. Sorted ascending by score: best match first.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedOffer {
    pub offer: RideOffer,
    pub origin_deviation_km: f64,
    pub destination_deviation_km: f64,
    pub score: f64,
    pub match_percent: f64,
}

/// The set of currently pending ride requests. One entry per trip; the
/// accept race is resolved with a compare-and-set on `driver_response`
/// under the offer's entry guard.
pub struct RideRequestBoard {
    offers: DashMap<Uuid, RideOffer>,
}

impl RideRequestBoard {
    pub fn new() -> Self {
        Self {
            offers: DashMap::new(),
        }
    }

    pub fn post(
        &self,
        rider_id: Uuid,
        origin: Place,
        destination: Place,
    ) -> Result<RideOffer, AppError> {
        for place in [&origin, &destination] {
            if !geo::in_range(&place.point) {
                return Err(AppError::Validation(format!(
                    "coordinate out of range: lat {}, lng {}",
                    place.point.lat, place.point.lng
                )));
            }
        }

        if self.active_for_rider(rider_id).is_some() {
            return Err(AppError::Conflict(
                "you already have an active ride request".to_string(),
            ));
        }

        let offer = RideOffer::new(rider_id, origin, destination);
        self.offers.insert(offer.trip_id, offer.clone());
        Ok(offer)
    }

    pub fn get(&self, trip_id: Uuid) -> Option<RideOffer> {
        self.offers.get(&trip_id).map(|entry| entry.value().clone())
    }

    pub fn active_for_rider(&self, rider_id: Uuid) -> Option<RideOffer> {
        self.offers
            .iter()
            .find(|entry| entry.rider_id == rider_id && entry.is_active())
            .map(|entry| entry.value().clone())
    }

    /// Rider-initiated teardown of a not-yet-confirmed request. No reason
    /// required, unlike `cancel`.
    pub fn withdraw(&self, trip_id: Uuid, rider_id: Uuid) -> Result<RideOffer, AppError> {
        let mut offer = self
            .offers
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        if offer.rider_id != rider_id {
            return Err(AppError::Forbidden(
                "you can only withdraw your own ride request".to_string(),
            ));
        }
        if !offer.is_active() {
            return Err(AppError::Conflict(format!(
                "cannot withdraw a trip in state {:?}",
                offer.status
            )));
        }

        offer.status = OfferStatus::Cancelled;
        offer.cancelled_by = Some(CancelledBy::Rider);
        offer.cancelled_at = Some(Utc::now());
        Ok(offer.clone())
    }

    /// The "nearby requests" radius view, independent of route
    /// compatibility. Sorted nearest first.
    pub fn list_for_driver(
        &self,
        presence: &DriverPresenceRegistry,
        driver_id: Uuid,
        radius_km: f64,
    ) -> Result<Vec<NearbyOffer>, AppError> {
        let driver = presence
            .get(driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        let Some(location) = driver.location else {
            return Ok(vec![]);
        };

        let mut nearby: Vec<NearbyOffer> = self
            .offers
            .iter()
            .filter(|entry| entry.is_open() && entry.rider_id != driver_id)
            .filter_map(|entry| {
                let distance_km = geo::haversine_km(&location, &entry.origin.point);
                (distance_km <= radius_km).then(|| NearbyOffer {
                    offer: entry.value().clone(),
                    distance_km,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        Ok(nearby)
    }

    /// The canonical dispatch view: seeking offers compatible with the
    /// driver's declared route. Empty when the driver is offline or has
    /// no route, since either disqualifies them from matching.
    pub fn list_matching_route(
        &self,
        presence: &DriverPresenceRegistry,
        driver_id: Uuid,
        max_deviation_km: f64,
    ) -> Result<Vec<MatchedOffer>, AppError> {
        let driver = presence
            .get(driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        if !driver.online {
            return Ok(vec![]);
        }
        let Some(route) = driver.route else {
            return Ok(vec![]);
        };

        let mut matched = Vec::new();
        for entry in self.offers.iter() {
            let offer = entry.value();
            if !offer.is_open() || offer.rider_id == driver_id {
                continue;
            }

            if let Some(m) = compat::evaluate(
                &route,
                &offer.origin.point,
                &offer.destination.point,
                max_deviation_km,
            )? {
                matched.push(MatchedOffer {
                    offer: offer.clone(),
                    origin_deviation_km: m.origin_deviation_km,
                    destination_deviation_km: m.destination_deviation_km,
                    score: m.score,
                    match_percent: compat::match_percent(&m),
                });
            }
        }

        matched.sort_by(|a, b| a.score.total_cmp(&b.score));
        Ok(matched)
    }

    /// Driver-side transition. Accept is a compare-and-set on
    /// `driver_response` (Pending -> Accepted) held under the entry
    /// guard: the first responder wins, everyone else gets a conflict.
    /// Reject while seeking leaves the offer open for other drivers; a
    /// matched driver rejecting reopens the offer.
    pub fn driver_respond(
        &self,
        trip_id: Uuid,
        driver_id: Uuid,
        response: PartyResponse,
        price: Option<f64>,
    ) -> Result<RideOffer, AppError> {
        let mut offer = self
            .offers
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        if offer.rider_id == driver_id {
            return Err(AppError::Conflict(
                "cannot respond to your own ride request".to_string(),
            ));
        }

        match response {
            PartyResponse::Pending => Err(AppError::Validation(
                "response must be Accepted or Rejected".to_string(),
            )),
            PartyResponse::Accepted => {
                if offer.status != OfferStatus::Seeking
                    || offer.driver_response != PartyResponse::Pending
                {
                    return Err(AppError::Conflict(
                        "this ride is no longer available".to_string(),
                    ));
                }

                offer.driver_response = PartyResponse::Accepted;
                offer.matched_driver_id = Some(driver_id);
                offer.status = OfferStatus::Matched;
                offer.matched_at = Some(Utc::now());
                offer.price = price;
                Ok(offer.clone())
            }
            PartyResponse::Rejected => match offer.status {
                // Rejection does not poison the offer for everyone.
                OfferStatus::Seeking => Ok(offer.clone()),
                OfferStatus::Matched if offer.matched_driver_id == Some(driver_id) => {
                    reopen(&mut offer);
                    Ok(offer.clone())
                }
                _ => Err(AppError::Conflict(
                    "this ride is no longer available".to_string(),
                )),
            },
        }
    }

    /// Rider-side transition: confirm the matched driver, or decline and
    /// return the offer to the pool.
    pub fn rider_respond(
        &self,
        trip_id: Uuid,
        rider_id: Uuid,
        response: PartyResponse,
    ) -> Result<RideOffer, AppError> {
        let mut offer = self
            .offers
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        if offer.rider_id != rider_id {
            return Err(AppError::Forbidden(
                "you can only respond to your own trips".to_string(),
            ));
        }

        match response {
            PartyResponse::Pending => Err(AppError::Validation(
                "response must be Accepted or Rejected".to_string(),
            )),
            PartyResponse::Accepted => {
                if offer.status != OfferStatus::Matched
                    || offer.driver_response != PartyResponse::Accepted
                {
                    return Err(AppError::Conflict(
                        "no driver match to confirm".to_string(),
                    ));
                }

                offer.rider_response = PartyResponse::Accepted;
                offer.status = OfferStatus::Confirmed;
                Ok(offer.clone())
            }
            PartyResponse::Rejected => {
                if offer.status != OfferStatus::Matched {
                    return Err(AppError::Conflict(
                        "no driver match to decline".to_string(),
                    ));
                }

                reopen(&mut offer);
                Ok(offer.clone())
            }
        }
    }

    /// Either-party cancellation. Reason validation and counterpart
    /// notification live in the lifecycle layer; this is the record
    /// transition only.
    pub fn cancel(
        &self,
        trip_id: Uuid,
        caller_id: Uuid,
        reason: &str,
    ) -> Result<RideOffer, AppError> {
        let mut offer = self
            .offers
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        let is_rider = offer.rider_id == caller_id;
        let is_driver = offer.matched_driver_id == Some(caller_id);
        if !is_rider && !is_driver {
            return Err(AppError::Forbidden(
                "you are not a party to this trip".to_string(),
            ));
        }
        if offer.status == OfferStatus::Cancelled {
            return Err(AppError::Conflict("trip is already cancelled".to_string()));
        }

        offer.status = OfferStatus::Cancelled;
        offer.cancellation_reason = Some(reason.to_string());
        offer.cancelled_by = Some(if is_rider {
            CancelledBy::Rider
        } else {
            CancelledBy::Driver
        });
        offer.cancelled_at = Some(Utc::now());
        Ok(offer.clone())
    }

    /// Offers still visible to dispatch listings.
    pub fn open_count(&self) -> usize {
        self.offers.iter().filter(|entry| entry.is_open()).count()
    }

    /// All trips the board knows about, terminal states included.
    pub fn trip_count(&self) -> usize {
        self.offers.len()
    }
}

impl Default for RideRequestBoard {
    fn default() -> Self {
        Self::new()
    }
}

fn reopen(offer: &mut RideOffer) {
    offer.matched_driver_id = None;
    offer.driver_response = PartyResponse::Pending;
    offer.rider_response = PartyResponse::Pending;
    offer.status = OfferStatus::Seeking;
    offer.price = None;
    offer.matched_at = None;
}
