use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::PlacesError,
    model::{
        DirectionsResult, DistanceMatrixResult, Geometry, LocationData, PlaceAutocomplete,
        PlaceDetails, Waypoint,
    },
    provider::{AutocompleteRequest, PlacesBackend, TravelMode, check_status},
    transport::Transport,
};

/// Fields requested from the details endpoint.
pub const DETAILS_FIELDS: &str = "place_id,formatted_address,geometry,name,types";

/// Statuses that prove a key is accepted by the autocomplete endpoint.
const PROBE_OK: &[&str] = &["OK", "ZERO_RESULTS"];

/// Calls the mapping provider's JSON endpoints directly.
#[derive(Debug, Clone)]
pub struct GoogleBackend {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl GoogleBackend {
    pub fn new(base_url: String, transport: Arc<dyn Transport>) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), transport }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> Result<Value, PlacesError> {
        let url = self.url(path);
        debug!(%url, "provider request");

        let body = self.transport.get_json(&url, query).await?;
        check_status(&body)?;
        Ok(body)
    }

    /// Issue a minimal autocomplete with `api_key` and report whether the provider accepted it.
    pub async fn probe_key(&self, api_key: &str) -> bool {
        let query = [("input", "test".to_string()), ("key", api_key.to_string())];

        match self.transport.get_json(&self.url("place/autocomplete/json"), &query).await {
            Ok(body) => body
                .get("status")
                .and_then(Value::as_str)
                .is_some_and(|status| PROBE_OK.contains(&status)),
            Err(_) => false,
        }
    }

    pub async fn geocode(&self, api_key: &str, address: &str) -> Result<LocationData, PlacesError> {
        let body = self
            .fetch(
                "geocode/json",
                &[("address", address.to_string()), ("key", api_key.to_string())],
            )
            .await?;

        let first = first_geocode_result(body)?;
        Ok(LocationData::new(first.geometry.location.lat, first.geometry.location.lng)
            .with_address(first.formatted_address))
    }

    pub async fn reverse_geocode(
        &self,
        api_key: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<String, PlacesError> {
        let body = self
            .fetch(
                "geocode/json",
                &[("latlng", format!("{latitude},{longitude}")), ("key", api_key.to_string())],
            )
            .await?;

        Ok(first_geocode_result(body)?.formatted_address)
    }

    pub async fn directions(
        &self,
        api_key: &str,
        origin: &Waypoint,
        destination: &Waypoint,
        mode: TravelMode,
    ) -> Result<DirectionsResult, PlacesError> {
        let body = self
            .fetch(
                "directions/json",
                &[
                    ("origin", origin.to_query_value()),
                    ("destination", destination.to_query_value()),
                    ("mode", mode.as_str().to_string()),
                    ("key", api_key.to_string()),
                ],
            )
            .await?;

        decode(body)
    }

    pub async fn distance_matrix(
        &self,
        api_key: &str,
        origins: &[Waypoint],
        destinations: &[Waypoint],
        mode: TravelMode,
    ) -> Result<DistanceMatrixResult, PlacesError> {
        let body = self
            .fetch(
                "distancematrix/json",
                &[
                    ("origins", join_waypoints(origins)),
                    ("destinations", join_waypoints(destinations)),
                    ("mode", mode.as_str().to_string()),
                    ("key", api_key.to_string()),
                ],
            )
            .await?;

        decode(body)
    }
}

#[async_trait]
impl PlacesBackend for GoogleBackend {
    async fn autocomplete(
        &self,
        api_key: &str,
        request: &AutocompleteRequest,
    ) -> Result<Vec<PlaceAutocomplete>, PlacesError> {
        let mut query = vec![("input", request.input.clone()), ("key", api_key.to_string())];
        if let Some(bias) = &request.bias {
            query.push(("location", bias.as_latlng()));
            query.push(("radius", request.radius_m.to_string()));
        }
        query.push(("sessiontoken", request.session_token.clone()));

        let body = self.fetch("place/autocomplete/json", &query).await?;
        let parsed: AutocompleteResponse = decode(body)?;
        Ok(parsed.predictions)
    }

    async fn place_details(
        &self,
        api_key: &str,
        place_id: &str,
    ) -> Result<PlaceDetails, PlacesError> {
        let body = self
            .fetch(
                "place/details/json",
                &[
                    ("place_id", place_id.to_string()),
                    ("fields", DETAILS_FIELDS.to_string()),
                    ("key", api_key.to_string()),
                ],
            )
            .await?;

        let parsed: DetailsResponse = decode(body)?;
        Ok(parsed.result)
    }
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    predictions: Vec<PlaceAutocomplete>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    result: PlaceDetails,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

fn first_geocode_result(body: Value) -> Result<GeocodeResult, PlacesError> {
    let parsed: GeocodeResponse = decode(body)?;
    parsed.results.into_iter().next().ok_or_else(|| PlacesError::Provider {
        status: "ZERO_RESULTS".to_string(),
        message: Some("geocode response contained no results".to_string()),
    })
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, PlacesError> {
    serde_json::from_value(body).map_err(|e| PlacesError::Decode(e.to_string()))
}

fn join_waypoints(waypoints: &[Waypoint]) -> String {
    waypoints.iter().map(Waypoint::to_query_value).collect::<Vec<_>>().join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde_json::json;

    fn backend(transport: &MockTransport) -> GoogleBackend {
        GoogleBackend::new("https://maps.test/api/".into(), Arc::new(transport.clone()))
    }

    fn request(bias: Option<LocationData>) -> AutocompleteRequest {
        AutocompleteRequest {
            input: "1600 Pennsylvania".into(),
            bias,
            radius_m: 50_000,
            session_token: "tok123".into(),
        }
    }

    #[tokio::test]
    async fn autocomplete_sends_bias_only_when_given() {
        let transport = MockTransport::replying(json!({"status": "ZERO_RESULTS"}));
        let backend = backend(&transport);

        let _ = backend.autocomplete("KEY", &request(None)).await;
        let _ = backend.autocomplete("KEY", &request(Some(LocationData::new(1.5, 2.5)))).await;

        let sent = transport.requests();
        assert_eq!(sent[0].url, "https://maps.test/api/place/autocomplete/json");
        assert_eq!(sent[0].param("location"), None);
        assert_eq!(sent[0].param("sessiontoken"), Some("tok123"));
        assert_eq!(sent[1].param("location"), Some("1.5,2.5"));
        assert_eq!(sent[1].param("radius"), Some("50000"));
    }

    #[tokio::test]
    async fn place_details_requests_fixed_fields() {
        let transport = MockTransport::replying(json!({
            "status": "OK",
            "result": {
                "place_id": "abc",
                "formatted_address": "1 Main St",
                "geometry": {"location": {"lat": 1.0, "lng": 2.0}},
                "name": "Main",
                "types": ["street_address"]
            }
        }));

        let details = backend(&transport).place_details("KEY", "abc").await.unwrap();

        assert_eq!(details.formatted_address, "1 Main St");
        assert_eq!(transport.requests()[0].param("fields"), Some(DETAILS_FIELDS));
    }

    #[tokio::test]
    async fn geocode_takes_first_result() {
        let transport = MockTransport::replying(json!({
            "status": "OK",
            "results": [
                {"formatted_address": "First", "geometry": {"location": {"lat": 1.0, "lng": 2.0}}},
                {"formatted_address": "Second", "geometry": {"location": {"lat": 3.0, "lng": 4.0}}}
            ]
        }));

        let location = backend(&transport).geocode("KEY", "somewhere").await.unwrap();

        assert_eq!(location, LocationData::new(1.0, 2.0).with_address("First"));
    }

    #[tokio::test]
    async fn geocode_with_empty_results_is_an_error() {
        let transport = MockTransport::replying(json!({"status": "OK", "results": []}));
        assert!(backend(&transport).geocode("KEY", "nowhere").await.is_err());
    }

    #[tokio::test]
    async fn distance_matrix_joins_waypoints_with_pipes() {
        let transport = MockTransport::replying(json!({"status": "OK", "rows": []}));

        let _ = backend(&transport)
            .distance_matrix(
                "KEY",
                &[LocationData::new(1.0, 2.0).into()],
                &[LocationData::new(3.0, 4.0).into(), "Boston".into()],
                TravelMode::Walking,
            )
            .await
            .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.param("origins"), Some("1,2"));
        assert_eq!(sent.param("destinations"), Some("3,4|Boston"));
        assert_eq!(sent.param("mode"), Some("walking"));
    }

    #[tokio::test]
    async fn probe_accepts_ok_and_zero_results_only() {
        let ok = MockTransport::replying(json!({"status": "ZERO_RESULTS"}));
        assert!(backend(&ok).probe_key("KEY").await);

        let denied = MockTransport::replying(json!({"status": "REQUEST_DENIED"}));
        assert!(!backend(&denied).probe_key("KEY").await);

        assert!(!backend(&MockTransport::failing()).probe_key("KEY").await);
    }
}
