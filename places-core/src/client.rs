//! Resilient façade over the mapping provider.
//!
//! Every public operation has a defined "nothing found" value. Missing keys,
//! transport failures and provider errors are logged and turned into that
//! value (or into fallback suggestions for autocomplete), never returned.

use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use reqwest::Url;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    cache::GeocodeCache,
    config::{Config, mask_key, validate_key_format},
    error::PlacesError,
    model::{
        Candidate, DirectionsResult, DistanceMatrixResult, FALLBACK_PREFIX, LocationData,
        MapMarker, NearbyCandidate, PlaceAutocomplete, PlaceDetails, StructuredFormatting,
        Waypoint, is_fallback_id,
    },
    provider::{
        AutocompleteRequest, PlacesBackend, Platform, TravelMode, backend_from_config,
        google::GoogleBackend,
    },
    queue::RequestQueue,
    transport::{HttpTransport, Transport},
};

const SESSION_TOKEN_LEN: usize = 26;
const MAX_FALLBACK_SUGGESTIONS: usize = 5;
const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Drive", "Lane", "Boulevard"];

/// Outcome of [`PlacesClient::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelection {
    /// The consumer supplied key is used as is.
    Configured(String),
    /// The first candidate key the provider accepted.
    Probed(String),
    /// Calls go through the proxy, which owns its key.
    Proxied,
    /// No key could be used; operations short-circuit.
    Unavailable,
}

impl std::fmt::Display for KeySelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySelection::Configured(key) => write!(f, "configured key {}", mask_key(key)),
            KeySelection::Probed(key) => write!(f, "probed key {}", mask_key(key)),
            KeySelection::Proxied => f.write_str("proxy-held key"),
            KeySelection::Unavailable => f.write_str("no working key"),
        }
    }
}

#[derive(Debug)]
pub struct PlacesClient {
    /// Autocomplete and details; direct or proxied depending on platform.
    backend: Box<dyn PlacesBackend>,
    /// Geocoding, routing and key probing always talk to the provider.
    google: GoogleBackend,
    base_url: String,
    platform: Platform,
    consumer_key: Option<String>,
    candidate_keys: Vec<String>,
    api_key: Option<String>,
    geocode_queue: RequestQueue,
    request_queue: RequestQueue,
    cache: GeocodeCache,
    over_query_limit_backoff: Duration,
}

impl PlacesClient {
    /// Build a client that talks HTTP. Must be called inside a tokio runtime.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> anyhow::Result<Self> {
        let backend = backend_from_config(config, transport.clone())?;
        let consumer_key = config.resolved_api_key();

        // until initialize() runs, fall back to the first candidate
        let api_key = consumer_key.clone().or_else(|| config.candidate_keys.first().cloned());

        if api_key.is_none() && config.platform == Platform::Native {
            warn!("no maps API key configured, suggestions will be local fallbacks");
        }

        Ok(Self {
            backend,
            google: GoogleBackend::new(config.base_url.clone(), transport),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            platform: config.platform,
            consumer_key,
            candidate_keys: config.candidate_keys.clone(),
            api_key,
            geocode_queue: RequestQueue::new(config.geocode_delay()),
            request_queue: RequestQueue::new(config.request_delay()),
            cache: GeocodeCache::new(config.cache_ttl()),
            over_query_limit_backoff: config.over_query_limit_backoff(),
        })
    }

    /// Pick the key used for the rest of the session.
    ///
    /// A consumer supplied key wins without probing. Otherwise each candidate is
    /// probed in order with a minimal autocomplete call and the first accepted
    /// one becomes active.
    pub async fn initialize(&mut self) -> KeySelection {
        if self.platform == Platform::Web {
            info!("web platform, places calls go through the proxy");
            return KeySelection::Proxied;
        }

        if let Some(key) = &self.consumer_key {
            info!(key = %mask_key(key), "using configured maps API key");
            self.api_key = Some(key.clone());
            return KeySelection::Configured(key.clone());
        }

        for (index, key) in self.candidate_keys.iter().enumerate() {
            if !validate_key_format(key) {
                warn!(index, key = %mask_key(key), "candidate key has an unexpected format");
            }

            debug!(key = %mask_key(key), "testing maps API key");
            if self.google.probe_key(key).await {
                info!(key = %mask_key(key), "found working maps API key");
                self.api_key = Some(key.clone());
                return KeySelection::Probed(key.clone());
            }
            warn!(key = %mask_key(key), "maps API key rejected");
        }

        warn!("no candidate maps API key was accepted");
        self.api_key = None;
        KeySelection::Unavailable
    }

    pub fn is_configured(&self) -> bool {
        self.platform == Platform::Web || self.api_key.is_some()
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Masked active key, for diagnostics.
    pub fn active_key_prefix(&self) -> Option<String> {
        self.api_key.as_deref().map(mask_key)
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    fn backend_key(&self) -> Option<&str> {
        match self.platform {
            Platform::Web => Some(self.api_key.as_deref().unwrap_or_default()),
            Platform::Native => self.api_key.as_deref(),
        }
    }

    fn failure_reason(&self, error: &PlacesError) -> &'static str {
        match self.platform {
            Platform::Web => error.proxy_reason(),
            Platform::Native => error.reason(),
        }
    }

    /// Suggestions for `query`, optionally biased around `bias`.
    ///
    /// Never fails: on any error a locally generated list is returned whose
    /// first entry echoes the query.
    pub async fn autocomplete(
        &self,
        query: &str,
        bias: Option<&LocationData>,
        radius_m: u32,
    ) -> Vec<PlaceAutocomplete> {
        let Some(key) = self.backend_key() else {
            debug!("autocomplete without key, using fallback suggestions");
            return fallback_suggestions(query, PlacesError::NotConfigured.reason());
        };

        let request = AutocompleteRequest {
            input: query.to_string(),
            bias: bias.cloned(),
            radius_m,
            session_token: session_token(),
        };

        match self.backend.autocomplete(key, &request).await {
            Ok(predictions) => {
                debug!(count = predictions.len(), "autocomplete succeeded");
                predictions
            }
            Err(e) => {
                warn!(error = %e, "autocomplete failed, using fallback suggestions");
                fallback_suggestions(query, self.failure_reason(&e))
            }
        }
    }

    /// Resolve a suggestion to its details. Fallback ids resolve to `None`
    /// without touching the network.
    pub async fn place_details(&self, place_id: &str) -> Option<PlaceDetails> {
        if is_fallback_id(place_id) {
            debug!(place_id, "fallback place id, skipping details lookup");
            return None;
        }

        let key = self.backend_key()?;

        match self.backend.place_details(key, place_id).await {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(place_id, error = %e, "place details failed");
                None
            }
        }
    }

    pub async fn geocode_address(&self, address: &str) -> Option<LocationData> {
        if self.platform == Platform::Web {
            debug!("geocoding is not proxied on web");
            return None;
        }
        let key = self.api_key.as_deref()?;

        self.google
            .geocode(key, address)
            .await
            .inspect_err(|e| warn!(error = %e, "geocoding failed"))
            .ok()
    }

    /// Address for the coordinates, served from cache when a recent result exists.
    ///
    /// Uncached lookups go through the geocode queue. When the provider reports
    /// quota exhaustion the queued call holds off for the configured backoff and
    /// then yields `None`; it is not retried.
    pub async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> Option<String> {
        if let Some(address) = self.cache.get(latitude, longitude) {
            debug!(latitude, longitude, "using cached geocode result");
            return Some(address);
        }

        if self.platform == Platform::Web {
            debug!("reverse geocoding is not proxied on web");
            return None;
        }
        let key = self.api_key.clone()?;

        let google = self.google.clone();
        let backoff = self.over_query_limit_backoff;

        let outcome = self
            .geocode_queue
            .enqueue(async move {
                match google.reverse_geocode(&key, latitude, longitude).await {
                    Err(PlacesError::OverQueryLimit) => {
                        warn!(backoff_ms = backoff.as_millis() as u64, "geocode quota exceeded");
                        tokio::time::sleep(backoff).await;
                        Err(PlacesError::OverQueryLimit)
                    }
                    other => other,
                }
            })
            .await;

        match outcome {
            Ok(address) => {
                self.cache.put(latitude, longitude, address.clone());
                Some(address)
            }
            Err(e) => {
                debug!(error = %e, "reverse geocoding yielded nothing");
                None
            }
        }
    }

    pub async fn directions(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
        mode: TravelMode,
    ) -> Option<DirectionsResult> {
        let key = self.api_key.clone()?;
        let google = self.google.clone();
        let (origin, destination) = (origin.clone(), destination.clone());

        self.request_queue
            .enqueue(async move { google.directions(&key, &origin, &destination, mode).await })
            .await
            .inspect_err(|e| warn!(error = %e, "directions failed"))
            .ok()
    }

    pub async fn distance_matrix(
        &self,
        origins: &[Waypoint],
        destinations: &[Waypoint],
        mode: TravelMode,
    ) -> Option<DistanceMatrixResult> {
        let key = self.api_key.clone()?;
        let google = self.google.clone();
        let (origins, destinations) = (origins.to_vec(), destinations.to_vec());

        self.request_queue
            .enqueue(async move { google.distance_matrix(&key, &origins, &destinations, mode).await })
            .await
            .inspect_err(|e| warn!(error = %e, "distance matrix failed"))
            .ok()
    }

    /// Candidates within `max_distance_km` driving distance of `origin`, nearest first.
    ///
    /// One distance-matrix call covers all located candidates. Candidates without
    /// a location, with a non-OK element or without a distance are dropped.
    pub async fn find_nearby_candidates(
        &self,
        origin: &LocationData,
        candidates: &[Candidate],
        max_distance_km: f64,
    ) -> Vec<NearbyCandidate> {
        let located: Vec<(&Candidate, &LocationData)> = candidates
            .iter()
            .filter_map(|c| c.location.as_ref().map(|location| (c, location)))
            .collect();

        if located.is_empty() {
            return Vec::new();
        }

        let destinations: Vec<Waypoint> =
            located.iter().map(|(_, location)| Waypoint::Location((*location).clone())).collect();

        let Some(matrix) = self
            .distance_matrix(&[Waypoint::Location(origin.clone())], &destinations, TravelMode::Driving)
            .await
        else {
            return Vec::new();
        };

        let Some(row) = matrix.rows.first() else {
            return Vec::new();
        };

        let mut nearby: Vec<NearbyCandidate> = located
            .into_iter()
            .zip(row.elements.iter())
            .filter_map(|((candidate, location), element)| {
                if element.status != "OK" {
                    return None;
                }
                let distance = element.distance.as_ref()?;
                let distance_km = distance.value as f64 / 1000.0;
                if distance_km > max_distance_km {
                    return None;
                }

                Some(NearbyCandidate {
                    id: candidate.id.clone(),
                    label: candidate.label.clone(),
                    location: location.clone(),
                    distance_text: distance.text.clone(),
                    duration_text: element
                        .duration
                        .as_ref()
                        .map(|d| d.text.clone())
                        .unwrap_or_default(),
                    distance_km,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        nearby
    }

    /// Static map image URL, or an empty string when no key is available.
    ///
    /// Without markers a red marker is placed at the center; unlabelled markers
    /// are lettered `A`, `B`, `C`… in order.
    pub fn static_map_url(
        &self,
        center: &LocationData,
        zoom: u8,
        size: &str,
        markers: &[MapMarker],
    ) -> String {
        let Some(key) = self.api_key.as_deref() else {
            return String::new();
        };

        let mut params = vec![
            ("center".to_string(), center.as_latlng()),
            ("zoom".to_string(), zoom.to_string()),
            ("size".to_string(), size.to_string()),
            ("key".to_string(), key.to_string()),
        ];

        if markers.is_empty() {
            params.push(("markers".to_string(), format!("color:red|{}", center.as_latlng())));
        } else {
            for (index, marker) in markers.iter().enumerate() {
                let color = marker.color.as_deref().unwrap_or("red");
                let label = marker.label.clone().unwrap_or_else(|| marker_label(index));
                params.push((
                    "markers".to_string(),
                    format!("color:{color}|label:{label}|{}", marker.location.as_latlng()),
                ));
            }
        }

        match Url::parse_with_params(&format!("{}/staticmap", self.base_url), &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(error = %e, "invalid static map base url");
                String::new()
            }
        }
    }
}

fn marker_label(index: usize) -> String {
    char::from(b'A' + (index % 26) as u8).to_string()
}

/// Random token grouping the keystroke queries of one autocomplete session for billing.
pub fn session_token() -> String {
    thread_rng().sample_iter(&Alphanumeric).take(SESSION_TOKEN_LEN).map(char::from).collect()
}

/// Locally generated suggestions used when the provider cannot be asked.
///
/// The first entry always echoes `input`. For inputs longer than three
/// characters that contain a digit, common street suffixes not already present
/// are offered as well. At most five entries are returned.
pub fn fallback_suggestions(input: &str, reason: &str) -> Vec<PlaceAutocomplete> {
    let stamp = Utc::now().timestamp_millis();

    let mut suggestions = vec![PlaceAutocomplete {
        place_id: format!("{FALLBACK_PREFIX}{stamp}_1"),
        description: input.to_string(),
        structured_formatting: StructuredFormatting {
            main_text: input.to_string(),
            secondary_text: format!("Manual entry ({reason})"),
        },
        types: vec!["establishment".to_string()],
    }];

    let lower = input.to_lowercase();
    if input.chars().count() > 3 && input.chars().any(|c| c.is_ascii_digit()) {
        for (index, suffix) in STREET_SUFFIXES.iter().enumerate() {
            if lower.contains(&suffix.to_lowercase()) {
                continue;
            }
            let text = format!("{input} {suffix}");
            suggestions.push(PlaceAutocomplete {
                place_id: format!("{FALLBACK_PREFIX}{stamp}_{}", index + 2),
                description: text.clone(),
                structured_formatting: StructuredFormatting {
                    main_text: text,
                    secondary_text: "Suggested address format".to_string(),
                },
                types: vec!["route".to_string()],
            });
        }
    }

    suggestions.truncate(MAX_FALLBACK_SUGGESTIONS);
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde_json::{Value, json};
    use tokio::time::Instant;

    const KEY: &str = "AIzaSyTESTKEY0000000000000000000000000";

    fn config() -> Config {
        Config {
            api_key: Some(KEY.into()),
            base_url: "https://maps.test/api".into(),
            ..Config::default()
        }
    }

    fn client(transport: &MockTransport) -> PlacesClient {
        PlacesClient::with_transport(&config(), Arc::new(transport.clone())).unwrap()
    }

    fn prediction(id: &str, text: &str) -> Value {
        json!({
            "place_id": id,
            "description": text,
            "structured_formatting": {"main_text": text, "secondary_text": "USA"},
            "types": ["geocode"]
        })
    }

    #[tokio::test]
    async fn autocomplete_returns_provider_predictions_in_order() {
        let transport = MockTransport::replying(json!({
            "status": "OK",
            "predictions": [prediction("a", "Alpha"), prediction("b", "Beta"), prediction("c", "Gamma")]
        }));

        let results = client(&transport).autocomplete("Alp", None, 50_000).await;

        let ids: Vec<&str> = results.iter().map(|p| p.place_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let sent = &transport.requests()[0];
        assert_eq!(sent.param("sessiontoken").map(str::len), Some(SESSION_TOKEN_LEN));
        assert_eq!(sent.param("key"), Some(KEY));
    }

    #[tokio::test]
    async fn autocomplete_falls_back_on_transport_error() {
        let transport = MockTransport::failing();

        let results = client(&transport).autocomplete("1600 Pennsylvania", None, 50_000).await;

        assert!(!results.is_empty());
        assert_eq!(results[0].description, "1600 Pennsylvania");
        assert!(results.iter().all(PlaceAutocomplete::is_fallback));
        assert_eq!(results[0].structured_formatting.secondary_text, "Manual entry (Network error)");
    }

    #[tokio::test]
    async fn autocomplete_falls_back_on_provider_status() {
        let transport = MockTransport::replying(json!({"status": "REQUEST_DENIED"}));

        let results = client(&transport).autocomplete("Main", None, 50_000).await;

        assert_eq!(results[0].description, "Main");
        assert_eq!(results[0].structured_formatting.secondary_text, "Manual entry (API error)");
    }

    #[tokio::test]
    async fn autocomplete_without_key_makes_no_call() {
        let transport = MockTransport::failing();
        let client =
            PlacesClient::with_transport(&Config::default(), Arc::new(transport.clone())).unwrap();

        let results = client.autocomplete("Main", None, 50_000).await;

        assert_eq!(transport.count(), 0);
        assert_eq!(results[0].structured_formatting.secondary_text, "Manual entry (API not configured)");
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn fallback_place_details_never_hit_the_network() {
        let transport = MockTransport::failing();

        let details = client(&transport).place_details("fallback_1700000000000_1").await;

        assert!(details.is_none());
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn place_details_error_is_absent() {
        let transport = MockTransport::replying(json!({"status": "NOT_FOUND"}));
        assert!(client(&transport).place_details("ChIJ123").await.is_none());
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn geocode_address_returns_first_result() {
        let transport = MockTransport::replying(json!({
            "status": "OK",
            "results": [{"formatted_address": "1 Main St", "geometry": {"location": {"lat": 1.0, "lng": 2.0}}}]
        }));

        let location = client(&transport).geocode_address("1 main").await;

        assert_eq!(location, Some(LocationData::new(1.0, 2.0).with_address("1 Main St")));
    }

    fn reverse_ok() -> MockTransport {
        MockTransport::new(|req| {
            Ok(json!({
                "status": "OK",
                "results": [{
                    "formatted_address": format!("near {}", req.param("latlng").unwrap_or_default()),
                    "geometry": {"location": {"lat": 0.0, "lng": 0.0}}
                }]
            }))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn reverse_geocode_uses_cache_within_ttl() {
        let transport = reverse_ok();
        let client = client(&transport);

        let first = client.reverse_geocode(40.0, -75.0).await;
        tokio::time::advance(Duration::from_secs(60)).await;
        let second = client.reverse_geocode(40.0, -75.0).await;

        assert_eq!(first.as_deref(), Some("near 40,-75"));
        assert_eq!(first, second);
        assert_eq!(transport.count(), 1);

        tokio::time::advance(Duration::from_secs(300)).await;
        client.reverse_geocode(40.0, -75.0).await;
        assert_eq!(transport.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reverse_geocode_dispatches_are_spaced() {
        let transport = reverse_ok();
        let client = client(&transport);

        tokio::join!(
            client.reverse_geocode(1.0, 1.0),
            client.reverse_geocode(2.0, 2.0),
            client.reverse_geocode(3.0, 3.0),
        );

        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        for pair in sent.windows(2) {
            assert!(pair[1].at - pair[0].at >= Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reverse_geocode_over_quota_backs_off_once() {
        let transport = MockTransport::replying(json!({"status": "OVER_QUERY_LIMIT"}));
        let client = client(&transport);

        let start = Instant::now();
        let address = client.reverse_geocode(40.0, -75.0).await;
        let elapsed = Instant::now() - start;

        assert!(address.is_none());
        assert!(elapsed >= Duration::from_millis(2000));
        assert!(elapsed < Duration::from_millis(2100));
        assert_eq!(transport.count(), 1);
        assert!(client.cache().get(40.0, -75.0).is_none());
    }

    #[tokio::test]
    async fn web_platform_skips_geocoding_and_proxies_places() {
        let transport = MockTransport::new(|req| {
            assert!(req.url.starts_with("http://proxy.test/"));
            Ok(json!({"success": true, "status": "OK", "predictions": [prediction("p", "Proxied")]}))
        });
        let cfg = Config {
            platform: Platform::Web,
            proxy_base_url: Some("http://proxy.test".into()),
            ..Config::default()
        };
        let mut client = PlacesClient::with_transport(&cfg, Arc::new(transport.clone())).unwrap();

        assert_eq!(client.initialize().await, KeySelection::Proxied);
        assert!(client.geocode_address("anything").await.is_none());
        assert!(client.reverse_geocode(1.0, 2.0).await.is_none());

        let results = client.autocomplete("Pro", None, 1000).await;
        assert_eq!(results[0].place_id, "p");
        assert_eq!(transport.count(), 1);
    }

    fn web_client(transport: &MockTransport) -> PlacesClient {
        let cfg = Config {
            platform: Platform::Web,
            proxy_base_url: Some("http://proxy.test".into()),
            ..Config::default()
        };
        PlacesClient::with_transport(&cfg, Arc::new(transport.clone())).unwrap()
    }

    #[tokio::test]
    async fn web_fallbacks_name_the_proxy_failure() {
        let refused = MockTransport::replying(
            json!({"success": false, "status": "REQUEST_DENIED", "error": "denied", "predictions": []}),
        );
        let results = web_client(&refused).autocomplete("12 Main", None, 1000).await;
        assert_eq!(results[0].structured_formatting.secondary_text, "Manual entry (Backend proxy error)");

        let down = MockTransport::failing();
        let results = web_client(&down).autocomplete("12 Main", None, 1000).await;
        assert_eq!(
            results[0].structured_formatting.secondary_text,
            "Manual entry (Backend proxy unavailable)"
        );
    }

    #[tokio::test]
    async fn initialize_prefers_consumer_key() {
        let transport = MockTransport::failing();
        let cfg = Config { candidate_keys: vec!["AIzaCANDIDATE".into()], ..config() };
        let mut client = PlacesClient::with_transport(&cfg, Arc::new(transport.clone())).unwrap();

        assert_eq!(client.initialize().await, KeySelection::Configured(KEY.into()));
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn initialize_probes_candidates_in_order() {
        let transport = MockTransport::new(|req| {
            let status = if req.param("key") == Some("AIzaGOOD") { "ZERO_RESULTS" } else { "REQUEST_DENIED" };
            Ok(json!({"status": status}))
        });
        let cfg = Config {
            candidate_keys: vec!["AIzaBAD".into(), "AIzaGOOD".into(), "AIzaUNUSED".into()],
            ..Config::default()
        };
        let mut client = PlacesClient::with_transport(&cfg, Arc::new(transport.clone())).unwrap();

        assert_eq!(client.initialize().await, KeySelection::Probed("AIzaGOOD".into()));
        assert_eq!(transport.count(), 2);
        assert_eq!(client.active_key_prefix().as_deref(), Some("AIzaGOOD..."));
    }

    #[tokio::test]
    async fn initialize_without_working_key_is_unavailable() {
        let transport = MockTransport::failing();
        let cfg = Config { candidate_keys: vec!["AIzaBAD".into()], ..Config::default() };
        let mut client = PlacesClient::with_transport(&cfg, Arc::new(transport.clone())).unwrap();

        assert!(client.is_configured());
        assert_eq!(client.initialize().await, KeySelection::Unavailable);
        assert!(!client.is_configured());
    }

    fn located(id: &str, lat: f64) -> Candidate {
        Candidate { id: id.into(), label: id.to_uppercase(), location: Some(LocationData::new(lat, 0.0)) }
    }

    #[tokio::test(start_paused = true)]
    async fn nearby_candidates_are_filtered_and_sorted() {
        let transport = MockTransport::new(|req| {
            assert_eq!(req.param("destinations"), Some("1,0|2,0|3,0|4,0"));
            Ok(json!({
                "status": "OK",
                "rows": [{"elements": [
                    {"status": "OK", "distance": {"text": "8 km", "value": 8000}, "duration": {"text": "12 mins", "value": 720}},
                    {"status": "ZERO_RESULTS"},
                    {"status": "OK", "distance": {"text": "15 km", "value": 15000}, "duration": {"text": "20 mins", "value": 1200}},
                    {"status": "OK", "distance": {"text": "2 km", "value": 2000}, "duration": {"text": "4 mins", "value": 240}}
                ]}]
            }))
        });

        let candidates = vec![
            located("a", 1.0),
            located("b", 2.0),
            Candidate { id: "nowhere".into(), label: "Nowhere".into(), location: None },
            located("c", 3.0),
            located("d", 4.0),
        ];

        let nearby = client(&transport)
            .find_nearby_candidates(&LocationData::new(0.0, 0.0), &candidates, 10.0)
            .await;

        let ids: Vec<&str> = nearby.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "a"]);
        assert_eq!(nearby[0].distance_km, 2.0);
        assert_eq!(nearby[1].duration_text, "12 mins");
        assert_eq!(transport.count(), 1);
    }

    #[tokio::test]
    async fn nearby_without_located_candidates_makes_no_call() {
        let transport = MockTransport::failing();
        let candidates = vec![Candidate { id: "x".into(), label: "X".into(), location: None }];

        let nearby = client(&transport)
            .find_nearby_candidates(&LocationData::new(0.0, 0.0), &candidates, 10.0)
            .await;

        assert!(nearby.is_empty());
        assert_eq!(transport.count(), 0);
    }

    #[tokio::test]
    async fn directions_failure_is_absent() {
        let transport = MockTransport::replying(json!({"status": "NOT_FOUND"}));
        let result = client(&transport)
            .directions(&"A".into(), &"B".into(), TravelMode::Transit)
            .await;
        assert!(result.is_none());
        assert_eq!(transport.requests()[0].param("mode"), Some("transit"));
    }

    #[test]
    fn fallback_suggestions_add_street_suffixes_for_numbered_input() {
        let suggestions = fallback_suggestions("1600 Pennsylvania", "Network error");

        assert_eq!(suggestions.len(), MAX_FALLBACK_SUGGESTIONS);
        assert_eq!(suggestions[0].description, "1600 Pennsylvania");
        assert_eq!(suggestions[1].description, "1600 Pennsylvania Street");
        assert_eq!(suggestions[4].description, "1600 Pennsylvania Lane");
        assert!(suggestions.iter().all(|s| s.place_id.starts_with(FALLBACK_PREFIX)));
    }

    #[test]
    fn fallback_suggestions_skip_present_suffix_and_plain_words() {
        let with_suffix = fallback_suggestions("12 Oak Street", "x");
        assert!(with_suffix.iter().all(|s| s.description != "12 Oak Street Street"));

        let plain = fallback_suggestions("Main", "x");
        assert_eq!(plain.len(), 1);
    }

    #[tokio::test]
    async fn static_map_url_labels_markers() {
        let client = client(&MockTransport::failing());
        let center = LocationData::new(32.7767, -117.1611);

        let plain = client.static_map_url(&center, 15, "400x300", &[]);
        assert!(plain.starts_with("https://maps.test/api/staticmap?"));
        assert!(plain.contains("markers=color%3Ared%7C32.7767%2C-117.1611"));

        let markers = vec![
            MapMarker { location: LocationData::new(1.0, 2.0), label: None, color: None },
            MapMarker { location: LocationData::new(3.0, 4.0), label: None, color: Some("blue".into()) },
        ];
        let labelled = client.static_map_url(&center, 12, "200x200", &markers);
        assert!(labelled.contains("label%3AA"));
        assert!(labelled.contains("color%3Ablue%7Clabel%3AB"));
    }

    #[tokio::test]
    async fn static_map_url_empty_without_key() {
        let client =
            PlacesClient::with_transport(&Config::default(), Arc::new(MockTransport::failing()))
                .unwrap();
        assert_eq!(client.static_map_url(&LocationData::new(0.0, 0.0), 15, "400x300", &[]), "");
    }

    #[test]
    fn session_tokens_are_random() {
        assert_ne!(session_token(), session_token());
        assert!(session_token().chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
