//! Error handling module for the Roost client.
//!
//! Every transport failure is classified into exactly one variant of [`ApiError`]
//! at the HTTP client boundary. Resource clients re-wrap classified errors with a
//! resource-specific fallback message so callers never see the raw transport error.

use thiserror::Error;

/// Classified client error.
///
/// `Clone` is required so coalesced cache waiters can all observe the same failure.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// HTTP 401: the stored bearer token is no longer valid
    #[error("session expired")]
    SessionExpired(Option<String>),
    /// HTTP 404
    #[error("resource not found")]
    NotFound(Option<String>),
    /// HTTP 500
    #[error("server error")]
    ServerError(Option<String>),
    /// Any other non-2xx response, carrying the server-supplied message
    #[error("{0}")]
    Api(String),
    /// No response received (connect failure or timeout)
    #[error("network error: {0}")]
    Network(String),
    /// Request construction or response decoding failure
    #[error("{0}")]
    Client(String),
}

impl ApiError {
    /// Map an HTTP status code plus the optional server message to an error variant.
    ///
    /// Must only be called for non-2xx statuses.
    pub fn classify_status(status: u16, server_message: Option<String>) -> Self {
        match status {
            401 => ApiError::SessionExpired(server_message),
            404 => ApiError::NotFound(server_message),
            500 => ApiError::ServerError(server_message),
            _ => ApiError::Api(
                server_message.unwrap_or_else(|| format!("Request failed with status {status}")),
            ),
        }
    }

    /// Map a transport-level failure (no usable HTTP response) to an error variant.
    ///
    /// Only failures where the server was never reached count as `Network`;
    /// request-construction and body failures are the client's own fault.
    pub fn classify_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ApiError::Network(err.to_string())
        } else {
            ApiError::Client(err.to_string())
        }
    }

    /// The message supplied by the server, when one was present in the response body.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::SessionExpired(msg)
            | ApiError::NotFound(msg)
            | ApiError::ServerError(msg) => msg.as_deref(),
            ApiError::Api(msg) => Some(msg),
            ApiError::Network(_) | ApiError::Client(_) => None,
        }
    }

    /// Replace the carried message with the server message when present,
    /// otherwise the given resource-specific fallback string. The variant is
    /// preserved so classification (session expiry, transiency) survives the
    /// re-wrap.
    pub fn with_fallback(&self, fallback: &str) -> Self {
        let message = self.server_message().unwrap_or(fallback).to_string();
        match self {
            ApiError::SessionExpired(_) => ApiError::SessionExpired(Some(message)),
            ApiError::NotFound(_) => ApiError::NotFound(Some(message)),
            ApiError::ServerError(_) => ApiError::ServerError(Some(message)),
            ApiError::Network(detail) => ApiError::Network(detail.clone()),
            ApiError::Api(_) | ApiError::Client(_) => ApiError::Api(message),
        }
    }

    /// The single user-facing notification for this error: `(title, message)`.
    pub fn notification(&self) -> (&'static str, String) {
        match self {
            ApiError::SessionExpired(_) => ("Session Expired", "Please login again".to_string()),
            ApiError::NotFound(_) => (
                "Not Found",
                "The requested resource was not found".to_string(),
            ),
            ApiError::ServerError(_) => (
                "Server Error",
                "Something went wrong on our end".to_string(),
            ),
            ApiError::Api(msg) => ("Error", msg.clone()),
            ApiError::Network(_) => (
                "Network Error",
                "No response received from server".to_string(),
            ),
            ApiError::Client(msg) => ("Error", msg.clone()),
        }
    }

    /// Whether the failure is transient enough that a bounded refetch may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::ServerError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_statuses() {
        assert!(matches!(
            ApiError::classify_status(401, None),
            ApiError::SessionExpired(None)
        ));
        assert!(matches!(
            ApiError::classify_status(404, Some("gone".into())),
            ApiError::NotFound(Some(_))
        ));
        assert!(matches!(
            ApiError::classify_status(500, None),
            ApiError::ServerError(None)
        ));
    }

    #[test]
    fn test_classify_other_status_carries_message() {
        let err = ApiError::classify_status(422, Some("Rating must be 1-5".into()));
        assert!(matches!(&err, ApiError::Api(msg) if msg == "Rating must be 1-5"));
    }

    #[test]
    fn test_classify_other_status_without_body() {
        let err = ApiError::classify_status(403, None);
        assert!(matches!(&err, ApiError::Api(msg) if msg.contains("403")));
    }

    #[test]
    fn test_with_fallback_prefers_server_message() {
        let err = ApiError::Api("Email already registered".into());
        assert!(
            matches!(err.with_fallback("Registration failed"), ApiError::Api(msg) if msg == "Email already registered")
        );

        let err = ApiError::ServerError(None);
        assert!(
            matches!(err.with_fallback("Registration failed"), ApiError::ServerError(Some(msg)) if msg == "Registration failed")
        );
    }

    #[test]
    fn test_with_fallback_keeps_classification() {
        assert!(ApiError::ServerError(None)
            .with_fallback("Listing failed")
            .is_transient());
        assert!(matches!(
            ApiError::SessionExpired(None).with_fallback("Listing failed"),
            ApiError::SessionExpired(_)
        ));
        assert!(ApiError::Network("connection refused".into())
            .with_fallback("Listing failed")
            .is_transient());
    }

    #[tokio::test]
    async fn test_transport_classification() {
        let client = reqwest::Client::new();

        // Nothing listens on port 1: connection refused, server never reached.
        let err = client
            .get("http://127.0.0.1:1/api/listings")
            .send()
            .await
            .expect_err("connect must fail");
        assert!(matches!(
            ApiError::classify_transport(err),
            ApiError::Network(_)
        ));

        // A malformed URL fails at request construction, not on the wire.
        let err = client
            .get("not a url")
            .send()
            .await
            .expect_err("build must fail");
        assert!(matches!(
            ApiError::classify_transport(err),
            ApiError::Client(_)
        ));
    }

    #[test]
    fn test_notification_titles() {
        assert_eq!(
            ApiError::SessionExpired(None).notification().0,
            "Session Expired"
        );
        assert_eq!(
            ApiError::Network("x".into()).notification().1,
            "No response received from server"
        );
    }
}
