use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::models::driver::GeoPoint;

/// Latest reported position of one identity. Last write wins.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LiveFix {
    pub point: GeoPoint,
    pub updated_at: DateTime<Utc>,
}

/// One slot per identity, overwritten on every update. No history, no
/// interpolation; consumers poll the latest point. Who may read whose
/// slot is the caller's job (trip lookup), not this store's.
pub struct LiveLocationFeed {
    slots: DashMap<Uuid, LiveFix>,
}

impl LiveLocationFeed {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    pub fn update(&self, subject_id: Uuid, point: GeoPoint) -> Result<LiveFix, AppError> {
        if !geo::in_range(&point) {
            return Err(AppError::Validation(format!(
                "coordinate out of range: lat {}, lng {}",
                point.lat, point.lng
            )));
        }

        let fix = LiveFix {
            point,
            updated_at: Utc::now(),
        };
        self.slots.insert(subject_id, fix);
        Ok(fix)
    }

    pub fn get(&self, subject_id: Uuid) -> Option<LiveFix> {
        self.slots.get(&subject_id).map(|entry| *entry.value())
    }
}

impl Default for LiveLocationFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::LiveLocationFeed;
    use crate::models::driver::GeoPoint;

    #[test]
    fn latest_update_overwrites_slot() {
        let feed = LiveLocationFeed::new();
        let subject = Uuid::from_u128(1);

        feed.update(subject, GeoPoint { lat: 52.0, lng: 13.0 }).unwrap();
        feed.update(subject, GeoPoint { lat: 52.1, lng: 13.1 }).unwrap();

        let fix = feed.get(subject).unwrap();
        assert!((fix.point.lat - 52.1).abs() < 1e-9);
    }

    #[test]
    fn invalid_coordinate_is_rejected_not_clamped() {
        let feed = LiveLocationFeed::new();
        let subject = Uuid::from_u128(2);

        assert!(feed.update(subject, GeoPoint { lat: -91.0, lng: 0.0 }).is_err());
        assert!(feed.get(subject).is_none());
    }
}
