use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A named endpoint of a declared route or ride request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub point: GeoPoint,
}

/// A driver's self-reported route for the current online session.
/// Replaced wholesale on every set-online that carries one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredRoute {
    pub origin: Place,
    pub destination: Place,
    #[serde(default)]
    pub waypoints: Vec<GeoPoint>,
    pub price_per_ride: f64,
    pub set_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverPresence {
    pub driver_id: Uuid,
    pub online: bool,
    pub location: Option<GeoPoint>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub route: Option<DeclaredRoute>,
}

impl DriverPresence {
    pub fn offline(driver_id: Uuid) -> Self {
        Self {
            driver_id,
            online: false,
            location: None,
            location_updated_at: None,
            route: None,
        }
    }
}
