//! Geographic calculations

use crate::error::{DispatchError, Result};
use crate::types::Coordinate;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Round to two decimal places (0.01 km)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Haversine distance in kilometers, unrounded
fn haversine_km(from: &Coordinate, to: &Coordinate) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);

    // Clamp guards asin against a drifting a few ulps above 1 for antipodes.
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Great-circle distance between two points in kilometers, rounded to 0.01 km.
pub fn distance(from: &Coordinate, to: &Coordinate) -> Result<f64> {
    from.validate()?;
    to.validate()?;
    Ok(round2(haversine_km(from, to)))
}

/// Travel time in minutes for a leg at the given average speed.
pub fn travel_time_minutes(distance_km: f64, avg_speed_kmh: f64) -> Result<f64> {
    if !avg_speed_kmh.is_finite() || avg_speed_kmh <= 0.0 {
        return Err(DispatchError::invalid_parameter(
            "avgSpeedKmh",
            format!("must be a positive number, got {avg_speed_kmh}"),
        ));
    }
    Ok((distance_km / avg_speed_kmh) * 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    #[test]
    fn test_distance_prague_brno() {
        let prague = point(50.0755, 14.4378);
        let brno = point(49.1951, 16.6068);

        let d = distance(&prague, &brno).unwrap();

        // Prague to Brno is approximately 185 km
        assert!((d - 184.33).abs() < 0.01);
    }

    #[test]
    fn test_distance_same_point_is_zero() {
        let p = point(35.1856, 33.3823);
        assert_eq!(distance(&p, &p).unwrap(), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let points = [
            point(35.1856, 33.3823),
            point(35.19, 33.385),
            point(-33.8688, 151.2093),
            point(40.7128, -74.0060),
            point(0.0, 179.9),
            point(0.0, -179.9),
        ];
        for a in &points {
            for b in &points {
                assert_eq!(distance(a, b).unwrap(), distance(b, a).unwrap());
            }
        }
    }

    #[test]
    fn test_distance_is_rounded_to_two_decimals() {
        let d = distance(&point(35.1856, 33.3823), &point(35.19, 33.385)).unwrap();
        assert_eq!(d, 0.55);
        assert_eq!(round2(d), d);
    }

    #[test]
    fn test_distance_rejects_out_of_range() {
        let ok = point(0.0, 0.0);
        assert!(matches!(
            distance(&point(91.0, 0.0), &ok),
            Err(DispatchError::InvalidCoordinate { .. })
        ));
        assert!(distance(&ok, &point(0.0, 181.0)).is_err());
        assert!(distance(&ok, &point(f64::NAN, 0.0)).is_err());
    }

    #[test]
    fn test_distance_antipodes_is_half_circumference() {
        let d = distance(&point(0.0, 0.0), &point(0.0, 180.0)).unwrap();
        assert!((d - 20015.09).abs() < 0.01);
    }

    #[test]
    fn test_travel_time() {
        assert_eq!(travel_time_minutes(20.0, 40.0).unwrap(), 30.0);
        assert_eq!(travel_time_minutes(0.0, 40.0).unwrap(), 0.0);
    }

    #[test]
    fn test_travel_time_rejects_non_positive_speed() {
        assert!(matches!(
            travel_time_minutes(10.0, 0.0),
            Err(DispatchError::InvalidParameter { .. })
        ));
        assert!(travel_time_minutes(10.0, -5.0).is_err());
        assert!(travel_time_minutes(10.0, f64::NAN).is_err());
    }
}
