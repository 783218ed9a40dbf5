//! Core library for the laundry pickup app's places features.
//!
//! This crate defines:
//! - Configuration & API key handling
//! - A resilient client for the mapping provider (autocomplete, place details,
//!   geocoding, directions, distance matrix) with rate limiting and caching
//! - The address autocomplete state machine that drives it from user input
//!
//! It is used by `places-cli`, but can also be embedded by other front ends.

pub mod autocomplete;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod provider;
pub mod queue;
pub mod transport;

pub use autocomplete::{AddressAutocomplete, AutocompleteDriver, Event, Selection, SuggestionSource};
pub use cache::GeocodeCache;
pub use client::{KeySelection, PlacesClient};
pub use config::Config;
pub use error::PlacesError;
pub use location::LocationService;
pub use model::{
    Candidate, DirectionsResult, DistanceMatrixResult, LocationData, MapMarker, NearbyCandidate,
    PlaceAutocomplete, PlaceDetails, Waypoint,
};
pub use provider::{Platform, TravelMode};
pub use queue::RequestQueue;
