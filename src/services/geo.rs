use crate::models::place::Coordinate;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine great-circle distance in meters.
///
/// Every distance in the system goes through this one model, so cached
/// distances stay comparable to freshly computed ones.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}
