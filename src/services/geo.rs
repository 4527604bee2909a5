//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_km(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Build a multi-point directions link over the given points.
/// None when fewer than two points are available.
pub fn multi_point_map_url(points: &[Coordinates]) -> Option<String> {
    if points.len() < 2 {
        return None;
    }

    let waypoints: Vec<String> = points
        .iter()
        .map(|p| format!("{:.6},{:.6}", p.lat, p.lng))
        .collect();

    Some(format!(
        "https://www.google.com/maps/dir/{}",
        waypoints.join("/")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_kyiv_lviv() {
        let kyiv = Coordinates { lat: 50.4501, lng: 30.5234 };
        let lviv = Coordinates { lat: 49.8397, lng: 24.0297 };

        let distance = haversine_km(&kyiv, &lviv);

        // Kyiv to Lviv is approximately 470 km
        assert!((distance - 470.0).abs() < 10.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinates { lat: 50.0, lng: 30.0 };
        let distance = haversine_km(&point, &point);
        assert!((distance - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = Coordinates { lat: 50.45, lng: 30.52 };
        let b = Coordinates { lat: 50.47, lng: 30.54 };
        assert!((haversine_km(&a, &b) - haversine_km(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn test_map_url_two_points() {
        let points = vec![
            Coordinates { lat: 50.45, lng: 30.52 },
            Coordinates { lat: 50.46, lng: 30.53 },
        ];

        let url = multi_point_map_url(&points).unwrap();
        assert!(url.starts_with("https://www.google.com/maps/dir/"));
        assert!(url.contains("50.450000,30.520000"));
        assert!(url.contains("50.460000,30.530000"));
    }

    #[test]
    fn test_map_url_needs_two_points() {
        assert!(multi_point_map_url(&[]).is_none());
        assert!(multi_point_map_url(&[Coordinates { lat: 50.0, lng: 30.0 }]).is_none());
    }
}
