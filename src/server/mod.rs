//! Talking to the server under test
//!
//! [`ResourceFetcher`] is the single seam between the harness core and the
//! network. [`HttpFetcher`] is the reqwest implementation; tests substitute
//! scripted fetchers.

pub mod http;
pub mod response;

use async_trait::async_trait;

use crate::error::RequestError;
use crate::resource::{Resource, ResourceKind};

pub use http::{HttpFetcher, HttpOptions};
pub use response::{ResponseTracker, ServerResponse};

/// GET and decode a single resource
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, kind: ResourceKind, href: &str) -> Result<Resource, RequestError>;
}

/// Turns a response body into a [`Resource`]
pub trait PayloadDecoder: Send + Sync {
    /// Value sent in the Accept header
    fn content_type(&self) -> &'static str;

    fn decode(&self, kind: ResourceKind, body: &str) -> Result<Resource, String>;
}

/// Decodes the JSON rendition of [`Resource`]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl PayloadDecoder for JsonDecoder {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn decode(&self, kind: ResourceKind, body: &str) -> Result<Resource, String> {
        serde_json::from_str(body).map_err(|e| format!("{kind}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_decoder() {
        let decoder = JsonDecoder;
        let resource = decoder
            .decode(ResourceKind::Time, r#"{"href": "/tm", "fields": {"currentTime": 1700000000}}"#)
            .unwrap();
        assert_eq!(resource.href(), Some("/tm"));
        assert_eq!(resource.field_u64("currentTime"), Some(1_700_000_000));

        let err = decoder.decode(ResourceKind::Time, "<Time/>").unwrap_err();
        assert!(err.starts_with("Time: "));
    }
}
