use crate::track_point::TrackPoint;

pub const EARTH_RADIUS_KM: f64 = 6371.;

/// Great-circle distance in km between two (latitude, longitude) pairs given in degrees.
pub fn haversine_distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let d_lat = (p2.0 - p1.0).to_radians();
    let d_lon = (p2.1 - p1.1).to_radians();
    let lat1 = p1.0.to_radians();
    let lat2 = p2.0.to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    let c = 2. * f64::atan2(a.sqrt(), (1. - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn segment_distance(from: &TrackPoint, to: &TrackPoint) -> f64 {
    haversine_distance((from.latitude, from.longitude), (to.latitude, to.longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_distance((56.15, 10.2), (56.15, 10.2)), 0.);
    }

    #[test]
    fn thousandth_of_a_degree_on_the_equator() {
        let d = haversine_distance((0., 0.), (0., 0.001));
        assert!((d - 0.1112).abs() < 1e-4, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_distance((0., 0.), (1., 0.));
        assert!((d - 111.195).abs() < 1e-3, "got {d}");
    }

    #[test]
    fn antipodes_are_half_the_circumference() {
        let d = haversine_distance((0., 0.), (0., 180.));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }
}
