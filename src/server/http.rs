//! reqwest-backed fetcher
//!
//! Resolves hrefs against the server's base URL, records every exchange in a
//! [`ResponseTracker`] and decodes successful bodies with a [`PayloadDecoder`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{Client, Identity};
use url::Url;

use super::{JsonDecoder, PayloadDecoder, ResourceFetcher, ResponseTracker, ServerResponse};
use crate::error::RequestError;
use crate::resource::{Resource, ResourceKind};

/// Connection options for [`HttpFetcher`]
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub verify_ssl: bool,
    pub timeout: Duration,
    /// PEM encoded client certificate followed by its private key
    pub identity_pem: Option<Vec<u8>>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            verify_ssl: true,
            timeout: Duration::from_secs(30),
            identity_pem: None,
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    decoder: Arc<dyn PayloadDecoder>,
    responses: ResponseTracker,
}

impl HttpFetcher {
    pub fn new(base_url: Url, options: HttpOptions, responses: ResponseTracker) -> Result<Self, RequestError> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_ssl);

        if let Some(pem) = &options.identity_pem {
            let identity = Identity::from_pem(pem).map_err(|e| RequestError::Transport {
                url: base_url.to_string(),
                message: format!("invalid client identity: {e}"),
            })?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|e| RequestError::Transport {
            url: base_url.to_string(),
            message: format!("failed to create HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            base_url,
            decoder: Arc::new(JsonDecoder),
            responses,
        })
    }

    /// Swap the body decoder (the default is [`JsonDecoder`])
    pub fn with_decoder(mut self, decoder: Arc<dyn PayloadDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, href: &str) -> Result<Url, RequestError> {
        self.base_url
            .join(href)
            .map_err(|e| RequestError::InvalidUrl(format!("{href}: {e}")))
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, kind: ResourceKind, href: &str) -> Result<Resource, RequestError> {
        let url = self.resolve(href)?;
        tracing::debug!("GET {} ({})", url, kind);

        let requested_at = Utc::now();
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, self.decoder.content_type())
            .send()
            .await
            .map_err(|e| RequestError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| RequestError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        self.responses.log_response(ServerResponse {
            url: url.to_string(),
            method: "GET".to_string(),
            status: status.as_u16(),
            body: body.clone(),
            location,
            requested_at,
            received_at: Utc::now(),
        });

        if !status.is_success() {
            return Err(RequestError::Status {
                method: "GET".to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        self.decoder.decode(kind, &body).map_err(|message| RequestError::Decode {
            url: url.to_string(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_hrefs_against_base() {
        let base = Url::parse("https://my.test.server:1234/").unwrap();
        let fetcher = HttpFetcher::new(base, HttpOptions::default(), ResponseTracker::new()).unwrap();

        assert_eq!(
            fetcher.resolve("/edev/1").unwrap().as_str(),
            "https://my.test.server:1234/edev/1"
        );
        assert_eq!(
            fetcher.resolve("/edev?s=0&l=5").unwrap().as_str(),
            "https://my.test.server:1234/edev?s=0&l=5"
        );
    }

    #[test]
    fn test_invalid_identity_rejected() {
        let base = Url::parse("https://my.test.server/").unwrap();
        let options = HttpOptions {
            identity_pem: Some(b"clearly junk".to_vec()),
            ..Default::default()
        };
        assert!(matches!(
            HttpFetcher::new(base, options, ResponseTracker::new()),
            Err(RequestError::Transport { .. })
        ));
    }
}
