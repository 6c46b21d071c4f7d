//! HTTP transport for the Roost API.
//!
//! A single configured [`reqwest::Client`] with two fixed behaviors applied to
//! every request: attach the stored bearer token on the way out, and classify
//! failures into [`ApiError`] on the way in. Each classified failure produces
//! exactly one user-facing notification before the error is returned, so
//! callers must not notify again for the same failure.

use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Config;
use crate::errors::ApiError;
use crate::notify::{SharedNotifier, ToastKind};
use crate::token::TokenStore;

/// Response envelope shared by all Roost API endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Error body the server attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Configured request sender shared by all resource clients.
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    notifier: SharedNotifier,
}

impl HttpClient {
    /// Build the client with the configured base URL and request timeout.
    pub fn new(
        config: &Config,
        tokens: Arc<dyn TokenStore>,
        notifier: SharedNotifier,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            tokens,
            notifier,
        })
    }

    /// Start a request against an API path (must begin with `/`).
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Send a request, decoding the `{success, message, data}` envelope.
    ///
    /// Token-attachment step: a stored token becomes the bearer credential;
    /// token absence is not an error, and a token-store read failure downgrades
    /// to an unauthenticated request after a single notification.
    pub async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Envelope<T>, ApiError> {
        let builder = match self.tokens.get().await {
            Ok(Some(token)) => builder.bearer_auth(token),
            Ok(None) => builder,
            Err(e) => {
                tracing::warn!(error = %e, "token read failed, sending unauthenticated");
                self.notifier.notify(
                    ToastKind::Error,
                    "Authentication Error",
                    "Failed to retrieve authentication token",
                );
                builder
            }
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(ApiError::classify_transport(e))),
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .bytes()
                .await
                .ok()
                .and_then(|body| serde_json::from_slice::<ErrorBody>(&body).ok())
                .and_then(|body| body.message);
            let error = ApiError::classify_status(status.as_u16(), message);

            // A 401 means the stored token is no longer valid anywhere.
            if matches!(error, ApiError::SessionExpired(_)) {
                if let Err(e) = self.tokens.clear().await {
                    tracing::warn!(error = %e, "failed to clear rejected token");
                }
            }
            return Err(self.fail(error));
        }

        match response.json::<Envelope<T>>().await {
            Ok(envelope) => Ok(envelope),
            Err(e) => Err(self.fail(ApiError::Client(format!("Invalid response body: {e}")))),
        }
    }

    /// Convenience wrapper for bodyless requests.
    pub async fn send_to<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
    ) -> Result<Envelope<T>, ApiError> {
        self.send(self.request(method, path)).await
    }

    /// Emit the single notification for a classified error, then hand it back.
    fn fail(&self, error: ApiError) -> ApiError {
        let (title, message) = error.notification();
        tracing::debug!(%error, title, "request failed");
        self.notifier.notify(ToastKind::Error, title, &message);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::recorder::RecordingNotifier;
    use crate::token::MemoryTokenStore;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = Config::with_api_url("http://localhost:1/api/");
        let http = HttpClient::new(
            &config,
            Arc::new(MemoryTokenStore::new()),
            RecordingNotifier::new(),
        )
        .expect("client builds");

        let request = http
            .request(Method::GET, "/listings")
            .build()
            .expect("request builds");
        assert_eq!(request.url().as_str(), "http://localhost:1/api/listings");
    }
}
