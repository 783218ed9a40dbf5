use std::sync::Arc;

use tracing::debug;

use crate::{PlacesClient, model::LocationData};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Straight-line distance between two points, in kilometres.
pub fn haversine_km(a: &LocationData, b: &LocationData) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyUser {
    pub id: String,
    pub location: LocationData,
    pub distance_km: f64,
}

/// Human readable positions on top of the places client.
#[derive(Debug, Clone)]
pub struct LocationService {
    places: Arc<PlacesClient>,
}

impl LocationService {
    pub fn new(places: Arc<PlacesClient>) -> Self {
        Self { places }
    }

    /// Address for the coordinates, or the coordinates themselves when nothing
    /// better is known.
    pub async fn address_for(&self, latitude: f64, longitude: f64) -> String {
        match self.places.reverse_geocode(latitude, longitude).await {
            Some(address) => address,
            None => {
                debug!(latitude, longitude, "no address found, using coordinates");
                format!("{latitude:.4}, {longitude:.4}")
            }
        }
    }

    /// Attach an address to a bare position.
    pub async fn with_address(&self, location: LocationData) -> LocationData {
        let address = self.address_for(location.latitude, location.longitude).await;
        location.with_address(address)
    }

    /// Users within `max_distance_km` in a straight line, nearest first.
    pub fn find_nearby_users(
        origin: &LocationData,
        users: &[(String, Option<LocationData>)],
        max_distance_km: f64,
    ) -> Vec<NearbyUser> {
        let mut nearby: Vec<NearbyUser> = users
            .iter()
            .filter_map(|(id, location)| {
                let location = location.as_ref()?;
                let distance_km = haversine_km(origin, location);
                (distance_km <= max_distance_km).then(|| NearbyUser {
                    id: id.clone(),
                    location: location.clone(),
                    distance_km,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        nearby
    }
}
