use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::Place;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OfferStatus {
    Seeking,
    Matched,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PartyResponse {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CancelledBy {
    Rider,
    Driver,
}

/// A rider's ride request and its progression through matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideOffer {
    pub trip_id: Uuid,
    pub rider_id: Uuid,
    pub origin: Place,
    pub destination: Place,
    pub requested_at: DateTime<Utc>,
    pub status: OfferStatus,
    pub matched_driver_id: Option<Uuid>,
    pub driver_response: PartyResponse,
    pub rider_response: PartyResponse,
    pub price: Option<f64>,
    pub matched_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl RideOffer {
    pub fn new(rider_id: Uuid, origin: Place, destination: Place) -> Self {
        Self {
            trip_id: Uuid::new_v4(),
            rider_id,
            origin,
            destination,
            requested_at: Utc::now(),
            status: OfferStatus::Seeking,
            matched_driver_id: None,
            driver_response: PartyResponse::Pending,
            rider_response: PartyResponse::Pending,
            price: None,
            matched_at: None,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
        }
    }

    /// Non-terminal: the rider may not post another request while one of
    /// these exists.
    pub fn is_active(&self) -> bool {
        matches!(self.status, OfferStatus::Seeking | OfferStatus::Matched)
    }

    /// Visible to dispatch listings: still seeking and not claimed.
    pub fn is_open(&self) -> bool {
        self.status == OfferStatus::Seeking
            && self.driver_response == PartyResponse::Pending
            && self.matched_driver_id.is_none()
    }

    pub fn is_party(&self, caller_id: Uuid) -> bool {
        self.rider_id == caller_id || self.matched_driver_id == Some(caller_id)
    }

    /// The other party of the trip, from the caller's point of view.
    /// None when the caller is the rider and no driver is matched yet.
    pub fn counterpart_of(&self, caller_id: Uuid) -> Option<Uuid> {
        if self.rider_id == caller_id {
            self.matched_driver_id
        } else if self.matched_driver_id == Some(caller_id) {
            Some(self.rider_id)
        } else {
            None
        }
    }
}
