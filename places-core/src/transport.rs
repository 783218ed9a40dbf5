use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::{fmt::Debug, time::Duration};

use crate::error::PlacesError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Plain JSON-over-HTTPS GET, the only thing the backends need from the network.
///
/// Production code uses [`HttpTransport`]; tests swap in a scripted transport.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, PlacesError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, PlacesError> {
        let res = self
            .http
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| PlacesError::Transport(e.without_url().to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| PlacesError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            return Err(PlacesError::Http { status: status.as_u16(), body: truncate_body(&body) });
        }

        serde_json::from_str(&body).map_err(|e| PlacesError::Decode(e.to_string()))
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
