use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

use crate::{
    Config, PlaceAutocomplete, PlaceDetails,
    error::PlacesError,
    model::LocationData,
    provider::{google::GoogleBackend, proxy::ProxyBackend},
    transport::Transport,
};

pub mod google;
pub mod proxy;

/// Where the client runs, which decides whether the provider can be reached directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Native,
    /// Browser-embedded: provider calls are blocked cross-origin and go through the proxy.
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Native => "native",
            Platform::Web => "web",
        }
    }

    pub const fn all() -> &'static [Platform] {
        &[Platform::Native, Platform::Web]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Platform {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "native" => Ok(Platform::Native),
            "web" => Ok(Platform::Web),
            _ => Err(anyhow::anyhow!("Unknown platform '{value}'. Supported platforms: native, web.")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Transit => "transit",
        }
    }

    pub const fn all() -> &'static [TravelMode] {
        &[TravelMode::Driving, TravelMode::Walking, TravelMode::Bicycling, TravelMode::Transit]
    }
}

impl std::fmt::Display for TravelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TravelMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        TravelMode::all().iter().copied().find(|mode| mode.as_str() == lower).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown travel mode '{value}'. Supported modes: driving, walking, bicycling, transit."
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutocompleteRequest {
    pub input: String,
    pub bias: Option<LocationData>,
    pub radius_m: u32,
    pub session_token: String,
}

/// The two lookups that must work on every platform.
///
/// Implemented by the direct provider backend and by the same-origin proxy,
/// which return identical shapes so the client treats them alike.
#[async_trait]
pub trait PlacesBackend: Send + Sync + Debug {
    async fn autocomplete(
        &self,
        api_key: &str,
        request: &AutocompleteRequest,
    ) -> Result<Vec<PlaceAutocomplete>, PlacesError>;

    async fn place_details(&self, api_key: &str, place_id: &str)
    -> Result<PlaceDetails, PlacesError>;
}

/// Construct the autocomplete/details backend for the configured platform.
pub fn backend_from_config(
    config: &Config,
    transport: Arc<dyn Transport>,
) -> anyhow::Result<Box<dyn PlacesBackend>> {
    let boxed: Box<dyn PlacesBackend> = match config.platform {
        Platform::Native => Box::new(GoogleBackend::new(config.base_url.clone(), transport)),
        Platform::Web => {
            let proxy = config.proxy_base_url.as_ref().ok_or_else(|| {
                anyhow::anyhow!(
                    "No proxy configured for platform 'web'.\n\
                     Hint: run `places configure` and enter the same-origin proxy address."
                )
            })?;
            Box::new(ProxyBackend::new(proxy.clone(), transport))
        }
    };

    Ok(boxed)
}

/// Check the `status` field every provider response carries.
pub(crate) fn check_status(body: &Value) -> Result<(), PlacesError> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or("MISSING_STATUS");
    match status {
        "OK" => Ok(()),
        "OVER_QUERY_LIMIT" => Err(PlacesError::OverQueryLimit),
        other => Err(PlacesError::Provider {
            status: other.to_string(),
            message: body.get("error_message").and_then(Value::as_str).map(str::to_string),
        }),
    }
}
