use serde::Serialize;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::driver::{DeclaredRoute, GeoPoint};

pub const DEFAULT_MAX_DEVIATION_KM: f64 = 2.0;

// Secondary acceptance slack. Destination is deliberately looser than
// origin: pickup proximity matters more than dropoff proximity.
const ORIGIN_SLACK_FACTOR: f64 = 1.5;
const DESTINATION_SLACK_FACTOR: f64 = 2.0;

/// How far a rider's endpoints sit from a driver's declared route.
/// Lower score is a better match.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RouteMatch {
    pub origin_deviation_km: f64,
    pub destination_deviation_km: f64,
    pub score: f64,
}

/// Decides whether a rider's origin/destination pair is along a driver's
/// declared route. `Ok(None)` means no match; both endpoints must fall
/// within the deviation tolerance, either strictly or via the slackened
/// secondary rule.
pub fn evaluate(
    route: &DeclaredRoute,
    rider_origin: &GeoPoint,
    rider_destination: &GeoPoint,
    max_deviation_km: f64,
) -> Result<Option<RouteMatch>, AppError> {
    if max_deviation_km <= 0.0 {
        return Err(AppError::Validation(
            "max deviation must be positive".to_string(),
        ));
    }

    let origin_deviation_km = haversine_km(&route.origin.point, rider_origin);
    let destination_deviation_km = haversine_km(&route.destination.point, rider_destination);

    let strict =
        origin_deviation_km <= max_deviation_km && destination_deviation_km <= max_deviation_km;
    let loose = origin_deviation_km <= max_deviation_km * ORIGIN_SLACK_FACTOR
        && destination_deviation_km <= max_deviation_km * DESTINATION_SLACK_FACTOR;

    if !(strict || loose) {
        return Ok(None);
    }

    Ok(Some(RouteMatch {
        origin_deviation_km,
        destination_deviation_km,
        score: origin_deviation_km + destination_deviation_km,
    }))
}

/// Presentational only; acceptance decisions never look at this.
pub fn match_percent(m: &RouteMatch) -> f64 {
    (100.0 - (m.score / 2.0) * 10.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{DEFAULT_MAX_DEVIATION_KM, evaluate, match_percent};
    use crate::models::driver::{DeclaredRoute, GeoPoint, Place};

    // One degree of latitude spans EARTH_RADIUS_KM * pi / 180 kilometers.
    const KM_PER_DEGREE_LAT: f64 = 111.194_926_644_558_74;

    fn km_north(base: GeoPoint, km: f64) -> GeoPoint {
        GeoPoint {
            lat: base.lat + km / KM_PER_DEGREE_LAT,
            lng: base.lng,
        }
    }

    fn route() -> DeclaredRoute {
        DeclaredRoute {
            origin: Place {
                name: "depot".to_string(),
                point: GeoPoint { lat: 0.0, lng: 0.0 },
            },
            destination: Place {
                name: "harbor".to_string(),
                point: GeoPoint { lat: 1.0, lng: 0.0 },
            },
            waypoints: vec![],
            price_per_ride: 12.0,
            set_at: Utc::now(),
        }
    }

    #[test]
    fn both_endpoints_within_tolerance_match() {
        let route = route();
        let rider_origin = km_north(route.origin.point, 1.5);
        let rider_dest = km_north(route.destination.point, 1.5);

        let result = evaluate(&route, &rider_origin, &rider_dest, DEFAULT_MAX_DEVIATION_KM)
            .unwrap()
            .expect("both deviations under 2.0 km must match");

        assert!((result.origin_deviation_km - 1.5).abs() < 0.01);
        assert!((result.destination_deviation_km - 1.5).abs() < 0.01);
        assert!((result.score - 3.0).abs() < 0.02);
    }

    #[test]
    fn origin_past_secondary_slack_rejects() {
        let route = route();
        // 3.5 km beats both the 2.0 primary and the 3.0 secondary bound.
        let rider_origin = km_north(route.origin.point, 3.5);
        let rider_dest = km_north(route.destination.point, 1.5);

        let result =
            evaluate(&route, &rider_origin, &rider_dest, DEFAULT_MAX_DEVIATION_KM).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn secondary_rule_is_looser_on_destination() {
        let route = route();
        let rider_origin = km_north(route.origin.point, 2.5);
        let rider_dest = km_north(route.destination.point, 3.5);

        // 2.5 <= 3.0 and 3.5 <= 4.0: accepted by the secondary rule only.
        let result = evaluate(&route, &rider_origin, &rider_dest, DEFAULT_MAX_DEVIATION_KM)
            .unwrap()
            .expect("secondary acceptance should fire");
        assert!(result.score > 5.9);

        // Mirrored deviations fail: origin slack is the tighter one.
        let rider_origin = km_north(route.origin.point, 3.5);
        let rider_dest = km_north(route.destination.point, 2.5);
        let result =
            evaluate(&route, &rider_origin, &rider_dest, DEFAULT_MAX_DEVIATION_KM).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn non_positive_tolerance_is_a_configuration_error() {
        let route = route();
        let p = GeoPoint { lat: 0.0, lng: 0.0 };
        assert!(evaluate(&route, &p, &p, 0.0).is_err());
        assert!(evaluate(&route, &p, &p, -1.0).is_err());
    }

    #[test]
    fn match_percent_is_clamped_for_display() {
        let route = route();
        let perfect = evaluate(
            &route,
            &route.origin.point,
            &route.destination.point,
            DEFAULT_MAX_DEVIATION_KM,
        )
        .unwrap()
        .unwrap();
        assert!((match_percent(&perfect) - 100.0).abs() < 0.1);

        let edge = evaluate(
            &route,
            &km_north(route.origin.point, 2.9),
            &km_north(route.destination.point, 3.9),
            DEFAULT_MAX_DEVIATION_KM,
        )
        .unwrap()
        .unwrap();
        let percent = match_percent(&edge);
        assert!((0.0..=100.0).contains(&percent));
    }
}
