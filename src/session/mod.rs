//! Auth session controller.
//!
//! Drives the `Initializing -> {Authenticated, Unauthenticated}` state machine
//! around the auth endpoints. Transitions are serialized through an internal
//! async mutex so exactly one transition occurs per call; a `login` while
//! already authenticated simply replaces the session.
//!
//! Transport failures are already toasted once by the HTTP layer, so this
//! module only adds notifications the HTTP layer cannot know about (session
//! bootstrap outcome, login/registration success).

use std::sync::{Arc, Mutex};

use crate::api::AuthClient;
use crate::errors::ApiError;
use crate::models::{LoginRequest, RegisterRequest, User};
use crate::notify::{SharedNotifier, ToastKind};
use crate::token::TokenStore;

/// Login state of the client.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Startup session check has not completed yet
    Initializing,
    Authenticated(User),
    Unauthenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Owns the session state machine and the stored bearer credential.
pub struct SessionController {
    auth: AuthClient,
    tokens: Arc<dyn TokenStore>,
    notifier: SharedNotifier,
    state: Mutex<SessionState>,
    /// Serializes login/register/logout/initialize calls
    transition: tokio::sync::Mutex<()>,
}

impl SessionController {
    pub fn new(auth: AuthClient, tokens: Arc<dyn TokenStore>, notifier: SharedNotifier) -> Self {
        Self {
            auth,
            tokens,
            notifier,
            state: Mutex::new(SessionState::Initializing),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().expect("session mutex poisoned").clone()
    }

    pub fn current_user(&self) -> Option<User> {
        match self.state() {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.state().is_authenticated()
    }

    /// Startup session check: validate any stored token against the server.
    ///
    /// Any failure clears the token and lands in `Unauthenticated`. The 401
    /// path already produced the "Session Expired" toast at the HTTP layer;
    /// other failures get the session-expired toast here.
    pub async fn initialize(&self) {
        let _guard = self.transition.lock().await;
        match self.auth.check_session().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "session restored");
                self.set_state(SessionState::Authenticated(user));
            }
            Err(err) => {
                tracing::info!(%err, "session check failed");
                if !matches!(err, ApiError::SessionExpired(_)) {
                    self.notifier
                        .notify(ToastKind::Error, "Session expired", "Please log in again");
                }
                if let Err(e) = self.tokens.clear().await {
                    tracing::warn!(error = %e, "failed to clear token after session check");
                }
                self.set_state(SessionState::Unauthenticated);
            }
        }
    }

    /// Exchange credentials for a session. On success the caller is expected
    /// to navigate to the main area.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<User, ApiError> {
        let _guard = self.transition.lock().await;
        match self.auth.login(credentials).await {
            Ok(user) => {
                self.notifier.notify(
                    ToastKind::Success,
                    "Welcome back",
                    &format!("Logged in as {}", user.name),
                );
                self.set_state(SessionState::Authenticated(user.clone()));
                Ok(user)
            }
            // Already toasted with the server message at the HTTP layer;
            // the state is left as it was.
            Err(err) => Err(err),
        }
    }

    /// Create an account. Success leaves the session `Unauthenticated`: the
    /// caller navigates to login while the verification email is pending.
    pub async fn register(&self, payload: &RegisterRequest) -> Result<User, ApiError> {
        let _guard = self.transition.lock().await;
        let user = self.auth.register(payload).await?;
        self.notifier.notify(
            ToastKind::Success,
            "Account created",
            "Please verify your email and log in",
        );
        self.set_state(SessionState::Unauthenticated);
        Ok(user)
    }

    /// Drop the session and delete the stored token.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let _guard = self.transition.lock().await;
        self.auth.logout().await?;
        self.set_state(SessionState::Unauthenticated);
        tracing::info!("logged out");
        Ok(())
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().expect("session mutex poisoned") = next;
    }
}
