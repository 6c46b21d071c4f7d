//! Auth endpoints.
//!
//! `login` and `register` persist the returned bearer token via the token
//! store before returning; `check_session` relies on the stored token and
//! propagates the classified error unwrapped, as the session controller
//! consumes it directly.

use std::sync::Arc;

use reqwest::Method;

use crate::errors::ApiError;
use crate::http::HttpClient;
use crate::models::{LoginRequest, RegisterRequest, User};
use crate::token::TokenStore;

/// Client for `/auth`.
#[derive(Clone)]
pub struct AuthClient {
    http: Arc<HttpClient>,
    tokens: Arc<dyn TokenStore>,
}

impl AuthClient {
    pub fn new(http: Arc<HttpClient>, tokens: Arc<dyn TokenStore>) -> Self {
        Self { http, tokens }
    }

    /// POST /auth/register - create an account.
    pub async fn register(&self, payload: &RegisterRequest) -> Result<User, ApiError> {
        let user = self
            .http
            .send::<User>(self.http.request(Method::POST, "/auth/register").json(payload))
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| e.with_fallback("Registration failed"))?;

        self.persist_token(&user).await?;
        Ok(user)
    }

    /// POST /auth/login - exchange credentials for a session.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<User, ApiError> {
        let user = self
            .http
            .send::<User>(
                self.http
                    .request(Method::POST, "/auth/login")
                    .json(credentials),
            )
            .await
            .map(|envelope| envelope.data)
            .map_err(|e| e.with_fallback("Login failed"))?;

        self.persist_token(&user).await?;
        Ok(user)
    }

    /// GET /auth/check-session - validate the stored token against the server.
    pub async fn check_session(&self) -> Result<User, ApiError> {
        self.http
            .send_to::<User>(Method::GET, "/auth/check-session")
            .await
            .map(|envelope| envelope.data)
    }

    /// Delete the stored token. Purely client-side; server-side invalidation
    /// is out of scope.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.tokens
            .clear()
            .await
            .map_err(|e| ApiError::Client(format!("Failed to clear authentication token: {e}")))
    }

    async fn persist_token(&self, user: &User) -> Result<(), ApiError> {
        let token = user
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Client("Invalid token received from server".to_string()))?;

        self.tokens
            .set(token)
            .await
            .map_err(|e| ApiError::Client(format!("Failed to store authentication token: {e}")))
    }
}
