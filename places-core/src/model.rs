use serde::{Deserialize, Serialize};

/// Prefix marking a locally generated suggestion that has no provider identity.
pub const FALLBACK_PREFIX: &str = "fallback_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl LocationData {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, address: None }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// `"lat,lng"` as the provider expects it in query strings.
    pub fn as_latlng(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredFormatting {
    pub main_text: String,
    #[serde(default)]
    pub secondary_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceAutocomplete {
    pub place_id: String,
    pub description: String,
    pub structured_formatting: StructuredFormatting,
    #[serde(default)]
    pub types: Vec<String>,
}

impl PlaceAutocomplete {
    pub fn is_fallback(&self) -> bool {
        is_fallback_id(&self.place_id)
    }
}

pub fn is_fallback_id(place_id: &str) -> bool {
    place_id.starts_with(FALLBACK_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
    pub place_id: String,
    pub formatted_address: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl PlaceDetails {
    pub fn to_location(&self) -> LocationData {
        LocationData::new(self.geometry.location.lat, self.geometry.location.lng)
            .with_address(self.formatted_address.clone())
    }
}

/// Distance or duration as reported by the provider: display text plus raw value
/// (metres or seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub text: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub distance: TextValue,
    pub duration: TextValue,
    #[serde(default)]
    pub html_instructions: String,
    pub start_location: LatLng,
    pub end_location: LatLng,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub distance: TextValue,
    pub duration: TextValue,
    #[serde(default)]
    pub start_address: String,
    #[serde(default)]
    pub end_address: String,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub legs: Vec<RouteLeg>,
    pub overview_polyline: Option<Polyline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsResult {
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixElement {
    pub status: String,
    pub distance: Option<TextValue>,
    pub duration: Option<TextValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    #[serde(default)]
    pub elements: Vec<MatrixElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceMatrixResult {
    #[serde(default)]
    pub rows: Vec<MatrixRow>,
}

/// Origin or destination for directions and distance-matrix queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Waypoint {
    Location(LocationData),
    Address(String),
}

impl Waypoint {
    pub fn to_query_value(&self) -> String {
        match self {
            Waypoint::Location(location) => location.as_latlng(),
            Waypoint::Address(address) => address.clone(),
        }
    }
}

impl From<LocationData> for Waypoint {
    fn from(location: LocationData) -> Self {
        Waypoint::Location(location)
    }
}

impl From<&str> for Waypoint {
    fn from(address: &str) -> Self {
        Waypoint::Address(address.to_string())
    }
}

/// Something that may be offered to a customer as a nearby service provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub label: String,
    pub location: Option<LocationData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyCandidate {
    pub id: String,
    pub label: String,
    pub location: LocationData,
    pub distance_text: String,
    pub duration_text: String,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub location: LocationData,
    pub label: Option<String>,
    pub color: Option<String>,
}
