use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::PlacesError,
    model::{PlaceAutocomplete, PlaceDetails},
    provider::{AutocompleteRequest, PlacesBackend},
    transport::Transport,
};

/// Same-origin proxy that performs provider calls server side.
///
/// The proxy holds its own key, so the key handed to the trait methods is not sent.
#[derive(Debug, Clone)]
pub struct ProxyBackend {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl ProxyBackend {
    pub fn new(base_url: String, transport: Arc<dyn Transport>) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), transport }
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ProxyResponse<T>, PlacesError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "proxy request");

        let body = self.transport.get_json(&url, query).await?;
        let parsed: ProxyResponse<T> =
            serde_json::from_value(body).map_err(|e| PlacesError::Decode(e.to_string()))?;

        if !parsed.success {
            return Err(PlacesError::Proxy {
                status: parsed.status.clone().unwrap_or_else(|| "PROXY_ERROR".to_string()),
                message: parsed.error.clone(),
            });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl PlacesBackend for ProxyBackend {
    async fn autocomplete(
        &self,
        _api_key: &str,
        request: &AutocompleteRequest,
    ) -> Result<Vec<PlaceAutocomplete>, PlacesError> {
        let mut query = vec![("input", request.input.clone())];
        if let Some(bias) = &request.bias {
            query.push(("latitude", bias.latitude.to_string()));
            query.push(("longitude", bias.longitude.to_string()));
        }
        query.push(("radius", request.radius_m.to_string()));

        let parsed: ProxyResponse<PredictionsPayload> = self.fetch("places-proxy", &query).await?;
        Ok(parsed.payload.predictions)
    }

    async fn place_details(
        &self,
        _api_key: &str,
        place_id: &str,
    ) -> Result<PlaceDetails, PlacesError> {
        let parsed: ProxyResponse<ResultPayload> =
            self.fetch("place-details-proxy", &[("placeId", place_id.to_string())]).await?;

        parsed.payload.result.ok_or_else(|| PlacesError::Proxy {
            status: parsed.status.unwrap_or_else(|| "EMPTY_RESULT".to_string()),
            message: Some("proxy reported success without a result".to_string()),
        })
    }
}

/// `{success, status, error?}` plus the operation specific payload.
#[derive(Debug, Deserialize)]
struct ProxyResponse<T> {
    success: bool,
    status: Option<String>,
    error: Option<String>,
    #[serde(flatten)]
    payload: T,
}

#[derive(Debug, Deserialize)]
struct PredictionsPayload {
    #[serde(default)]
    predictions: Vec<PlaceAutocomplete>,
}

#[derive(Debug, Deserialize)]
struct ResultPayload {
    result: Option<PlaceDetails>,
}
