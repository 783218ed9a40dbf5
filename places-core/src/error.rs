use thiserror::Error;

/// Failures inside the places client.
///
/// None of these reach the callers of [`crate::PlacesClient`]; each public
/// operation turns them into its "nothing found" value and logs the cause.
#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("no usable API key configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("provider returned status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Provider {
        status: String,
        message: Option<String>,
    },

    /// The same-origin proxy answered but reported failure.
    #[error("proxy returned status {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Proxy {
        status: String,
        message: Option<String>,
    },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("provider quota exceeded")]
    OverQueryLimit,

    #[error("request queue is shut down")]
    QueueClosed,
}

impl PlacesError {
    /// Short label used in the secondary text of fallback suggestions.
    pub fn reason(&self) -> &'static str {
        match self {
            PlacesError::NotConfigured => "API not configured",
            PlacesError::Transport(_) | PlacesError::Http { .. } => "Network error",
            PlacesError::Provider { .. } | PlacesError::OverQueryLimit => "API error",
            PlacesError::Decode(_) => "Invalid response",
            PlacesError::QueueClosed => "Service unavailable",
            PlacesError::Proxy { .. } => "Backend proxy error",
        }
    }

    /// Label for a failed call routed through the same-origin proxy.
    pub fn proxy_reason(&self) -> &'static str {
        match self {
            PlacesError::Proxy { .. } => "Backend proxy error",
            _ => "Backend proxy unavailable",
        }
    }
}
