//! Raw server responses
//!
//! Every HTTP exchange with the server under test is recorded so reports can
//! show exactly what the server said.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One response received from the server under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub body: String,
    /// Location header, if any
    pub location: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl ServerResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }
}

/// Shared log of server responses. Cloning yields another handle onto the
/// same log.
#[derive(Debug, Clone, Default)]
pub struct ResponseTracker {
    responses: Arc<Mutex<Vec<ServerResponse>>>,
}

impl ResponseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ServerResponse>> {
        self.responses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn log_response(&self, response: ServerResponse) {
        tracing::info!(
            "{} {} yielded {}: received body of length {}",
            response.method,
            response.url,
            response.status,
            response.body.len()
        );
        self.lock().push(response);
    }

    /// Copy of everything recorded so far
    pub fn responses(&self) -> Vec<ServerResponse> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> ServerResponse {
        ServerResponse {
            url: "https://server/dcap".to_string(),
            method: "GET".to_string(),
            status,
            body: "{}".to_string(),
            location: None,
            requested_at: Utc::now(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(response(200).is_success());
        assert!(response(201).is_success());
        assert!(!response(302).is_success());
        assert!(response(404).is_client_error());
        assert!(!response(500).is_client_error());
    }

    #[test]
    fn test_tracker_handles_share_log() {
        let tracker = ResponseTracker::new();
        let handle = tracker.clone();
        handle.log_response(response(200));
        handle.log_response(response(403));

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.responses()[1].status, 403);
    }
}
