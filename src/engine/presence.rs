use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::models::driver::{DeclaredRoute, DriverPresence, GeoPoint};

/// Which drivers are online, where they are, and what route they declared.
/// One entry per driver; every write happens under that entry's guard, so
/// readers see either the old record or the new one, never a blend.
pub struct DriverPresenceRegistry {
    drivers: DashMap<Uuid, DriverPresence>,
}

impl DriverPresenceRegistry {
    pub fn new() -> Self {
        Self {
            drivers: DashMap::new(),
        }
    }

    /// Idempotent. A supplied route replaces any prior route wholesale.
    pub fn set_online(
        &self,
        driver_id: Uuid,
        location: Option<GeoPoint>,
        route: Option<DeclaredRoute>,
    ) -> Result<DriverPresence, AppError> {
        if let Some(point) = &location {
            ensure_in_range(point)?;
        }
        if let Some(route) = &route {
            validate_route(route)?;
        }

        let mut entry = self
            .drivers
            .entry(driver_id)
            .or_insert_with(|| DriverPresence::offline(driver_id));

        entry.online = true;
        if let Some(point) = location {
            entry.location = Some(point);
            entry.location_updated_at = Some(Utc::now());
        }
        if let Some(route) = route {
            entry.route = Some(route);
        }

        Ok(entry.clone())
    }

    /// Route and last known location are retained for display; the entry
    /// just stops being a match candidate.
    pub fn set_offline(&self, driver_id: Uuid) -> Result<DriverPresence, AppError> {
        let mut entry = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        entry.online = false;
        Ok(entry.clone())
    }

    pub fn update_location(
        &self,
        driver_id: Uuid,
        point: GeoPoint,
    ) -> Result<DriverPresence, AppError> {
        ensure_in_range(&point)?;

        let mut entry = self
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;

        entry.location = Some(point);
        entry.location_updated_at = Some(Utc::now());
        Ok(entry.clone())
    }

    pub fn get(&self, driver_id: Uuid) -> Option<DriverPresence> {
        self.drivers
            .get(&driver_id)
            .map(|entry| entry.value().clone())
    }

    /// The match-candidate set: online drivers that declared a route.
    pub fn list_online_with_route(&self) -> Vec<DriverPresence> {
        self.drivers
            .iter()
            .filter(|entry| entry.online && entry.route.is_some())
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.drivers.iter().filter(|entry| entry.online).count()
    }
}

impl Default for DriverPresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_in_range(point: &GeoPoint) -> Result<(), AppError> {
    if !geo::in_range(point) {
        return Err(AppError::Validation(format!(
            "coordinate out of range: lat {}, lng {}",
            point.lat, point.lng
        )));
    }
    Ok(())
}

fn validate_route(route: &DeclaredRoute) -> Result<(), AppError> {
    ensure_in_range(&route.origin.point)?;
    ensure_in_range(&route.destination.point)?;
    for waypoint in &route.waypoints {
        ensure_in_range(waypoint)?;
    }
    if route.price_per_ride < 0.0 || !route.price_per_ride.is_finite() {
        return Err(AppError::Validation(
            "price per ride must be non-negative".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::DriverPresenceRegistry;
    use crate::models::driver::{DeclaredRoute, GeoPoint, Place};

    fn route() -> DeclaredRoute {
        DeclaredRoute {
            origin: Place {
                name: "home".to_string(),
                point: GeoPoint {
                    lat: 52.52,
                    lng: 13.405,
                },
            },
            destination: Place {
                name: "office".to_string(),
                point: GeoPoint {
                    lat: 52.5,
                    lng: 13.37,
                },
            },
            waypoints: vec![],
            price_per_ride: 8.5,
            set_at: Utc::now(),
        }
    }

    #[test]
    fn set_online_is_idempotent() {
        let registry = DriverPresenceRegistry::new();
        let id = Uuid::from_u128(1);

        registry.set_online(id, None, Some(route())).unwrap();
        let again = registry.set_online(id, None, None).unwrap();

        assert!(again.online);
        assert!(again.route.is_some());
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn offline_driver_keeps_route_but_leaves_candidate_set() {
        let registry = DriverPresenceRegistry::new();
        let id = Uuid::from_u128(2);

        registry
            .set_online(
                id,
                Some(GeoPoint {
                    lat: 52.52,
                    lng: 13.405,
                }),
                Some(route()),
            )
            .unwrap();
        assert_eq!(registry.list_online_with_route().len(), 1);

        let offline = registry.set_offline(id).unwrap();
        assert!(!offline.online);
        assert!(offline.route.is_some());
        assert!(offline.location.is_some());
        assert!(registry.list_online_with_route().is_empty());
    }

    #[test]
    fn online_without_route_is_not_a_candidate() {
        let registry = DriverPresenceRegistry::new();
        registry
            .set_online(Uuid::from_u128(3), None, None)
            .unwrap();
        assert!(registry.list_online_with_route().is_empty());
        assert_eq!(registry.online_count(), 1);
    }

    #[test]
    fn new_route_replaces_old_one_wholesale() {
        let registry = DriverPresenceRegistry::new();
        let id = Uuid::from_u128(4);

        let mut first = route();
        first.waypoints = vec![GeoPoint { lat: 52.51, lng: 13.39 }];
        registry.set_online(id, None, Some(first)).unwrap();

        let second = route();
        let presence = registry.set_online(id, None, Some(second)).unwrap();
        assert!(presence.route.unwrap().waypoints.is_empty());
    }

    #[test]
    fn out_of_range_location_is_rejected() {
        let registry = DriverPresenceRegistry::new();
        let id = Uuid::from_u128(5);
        registry.set_online(id, None, None).unwrap();

        let result = registry.update_location(id, GeoPoint { lat: 91.0, lng: 0.0 });
        assert!(result.is_err());
        assert!(registry.get(id).unwrap().location.is_none());
    }

    #[test]
    fn unknown_driver_location_update_is_not_found() {
        let registry = DriverPresenceRegistry::new();
        let result =
            registry.update_location(Uuid::from_u128(6), GeoPoint { lat: 0.0, lng: 0.0 });
        assert!(result.is_err());
    }
}
