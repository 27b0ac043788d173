//! Geographic calculations

use crate::services::polyline::{decode_polyline, ROUTE_PRECISION};
use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Miles per meter
pub const MILES_PER_METER: f64 = 0.000_621_371;

/// Road distance coefficient (straight line to road)
pub const ROAD_COEFFICIENT: f64 = 1.3;

/// Average truck speed in km/h for travel time estimation
pub const AVERAGE_SPEED_KMH: f64 = 80.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Estimate road distance (km) from straight-line distance
pub fn road_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    haversine_distance(from, to) * ROAD_COEFFICIENT
}

/// Running distance (km) from the first point to each point of a path
pub fn cumulative_distances(points: &[Coordinates]) -> Vec<f64> {
    let mut cumulative = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            total += haversine_distance(&points[i - 1], point);
        }
        cumulative.push(total);
    }
    cumulative
}

/// Point at `fraction` (clamped to 0..=1) of a path's length
///
/// Interpolates linearly between the two vertices around the target
/// distance. `None` for an empty path.
pub fn point_along(points: &[Coordinates], fraction: f64) -> Option<Coordinates> {
    let (first, last) = match (points.first(), points.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return None,
    };
    if points.len() < 2 {
        return Some(first);
    }

    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    let cumulative = cumulative_distances(points);
    let total = cumulative[cumulative.len() - 1];
    let target = total * fraction;

    // First vertex at or beyond the target distance.
    let i = cumulative.partition_point(|d| *d < target);
    if i == 0 {
        return Some(first);
    }
    if i >= points.len() {
        return Some(last);
    }

    let (s0, s1) = (cumulative[i - 1], cumulative[i]);
    let t = if s1 == s0 { 0.0 } else { (target - s0) / (s1 - s0) };
    let (a, b) = (points[i - 1], points[i]);
    Some(Coordinates {
        lat: a.lat + t * (b.lat - a.lat),
        lng: a.lng + t * (b.lng - a.lng),
    })
}

/// Point at `fraction` of an encoded route polyline
///
/// `None` when the polyline is empty or cannot be decoded.
pub fn point_on_polyline(encoded: &str, fraction: f64) -> Option<Coordinates> {
    let points = decode_polyline(encoded, ROUTE_PRECISION).ok()?;
    point_along(&points, fraction)
}
