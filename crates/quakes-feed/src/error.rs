use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context} payload is missing required field `{field}`")]
    MissingField {
        context: String,
        field: &'static str,
    },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{kind} fetch is not offered by {provider}")]
    UnsupportedFetch {
        kind: &'static str,
        provider: quakes_core::Provider,
    },

    #[error("operation cancelled")]
    Cancelled,
}
