//! HTTP transport implementation.
//!
//! Posts the sync request as JSON to the configured endpoint with the Auth
//! Gate's credential as a bearer token.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use marksync_core::{decode_response, SyncRequest, SyncResponse};

use crate::auth::AuthGate;
use crate::config::SyncConfig;
use crate::error::{Ineligibility, Result, SyncError};
use crate::transport::Transport;

/// HTTP-based sync transport.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    auth: Arc<dyn AuthGate>,
}

impl HttpTransport {
    /// Creates a transport for `config`'s endpoint.
    ///
    /// `config.request_timeout` bounds every exchange; a timeout surfaces
    /// as [`SyncError::Transport`].
    pub fn new(config: &SyncConfig, auth: Arc<dyn AuthGate>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            auth,
        })
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, request: &SyncRequest) -> Result<SyncResponse> {
        let token = self
            .auth
            .bearer_token()
            .await
            .ok_or(SyncError::NotEligible(Ineligibility::Unauthenticated))?;

        tracing::debug!(
            endpoint = %self.endpoint,
            changes = request.changes.len(),
            "posting sync request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
            return Err(SyncError::Unauthorized);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        decode_response(&body).map_err(SyncError::from)
    }
}
