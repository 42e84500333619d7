//! Session lifecycle
//!
//! `Unauthenticated -> Authenticating -> Authenticated -> Unauthenticated`.
//! A failed attempt drops straight back to `Unauthenticated`; there is no
//! retry state.

use crate::models::{AuthResponse, Credentials, Registration, User};
use crate::network::client::{ApiClient, ApiError};
use crate::storage::Identity;

#[derive(Clone, Debug, PartialEq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated(User),
}

/// Owns the client and tracks who is signed in
pub struct AuthManager {
    client: ApiClient,
    state: AuthState,
}

impl AuthManager {
    pub fn new(client: ApiClient) -> Self {
        AuthManager {
            client,
            state: AuthState::Unauthenticated,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }

    /// Log in and persist the identity. Rejected credentials surface as
    /// [`ApiError::InvalidCredentials`].
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<User, ApiError> {
        self.state = AuthState::Authenticating;
        let result = self
            .client
            .login(credentials)
            .await
            .map_err(reject_credentials);
        self.complete(result)
    }

    pub async fn register(&mut self, registration: &Registration) -> Result<User, ApiError> {
        self.state = AuthState::Authenticating;
        let result = self.client.register(registration).await;
        self.complete(result)
    }

    /// Startup check: a persisted identity is only trusted once the server
    /// confirms it. The identity is cleared when the server rejects it or the
    /// store is unreadable. Network failures and server errors leave it in
    /// place and are returned.
    pub async fn restore(&mut self) -> Result<bool, ApiError> {
        match self.client.session().is_present() {
            Ok(true) => {}
            Ok(false) => {
                self.state = AuthState::Unauthenticated;
                return Ok(false);
            }
            Err(e) => {
                tracing::error!(error = %e, "Session store unreadable");
                self.discard_session();
                return Ok(false);
            }
        }

        self.state = AuthState::Authenticating;
        match self.client.current_user().await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "Session restored");
                self.state = AuthState::Authenticated(user);
                Ok(true)
            }
            Err(e) if is_rejected_session(&e) => {
                tracing::warn!(error = %e, "Saved session rejected");
                self.discard_session();
                Ok(false)
            }
            Err(e) => {
                tracing::error!(error = %e, "Auth check failed");
                self.state = AuthState::Unauthenticated;
                Err(e)
            }
        }
    }

    /// Forget the persisted identity. Safe to call when signed out.
    pub fn clear_session(&mut self) -> Result<(), ApiError> {
        self.client.session().clear()?;
        self.state = AuthState::Unauthenticated;
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), ApiError> {
        self.clear_session()
    }

    fn complete(&mut self, result: Result<AuthResponse, ApiError>) -> Result<User, ApiError> {
        match result.and_then(|response| self.persist(response)) {
            Ok(user) => {
                self.state = AuthState::Authenticated(user.clone());
                Ok(user)
            }
            Err(e) => {
                tracing::error!(error = %e, "Authentication failed");
                self.state = AuthState::Unauthenticated;
                Err(e)
            }
        }
    }

    fn persist(&self, response: AuthResponse) -> Result<User, ApiError> {
        let user = response.user.ok_or(ApiError::InvalidCredentials)?;
        let identity = Identity::new(user.id.to_string(), response.token);
        self.client.session().persist(&identity)?;
        Ok(user)
    }

    fn discard_session(&mut self) {
        if let Err(e) = self.client.session().clear() {
            tracing::error!(error = %e, "Failed to clear session");
        }
        self.state = AuthState::Unauthenticated;
    }
}

/// The server no longer knows this identity
fn is_rejected_session(err: &ApiError) -> bool {
    matches!(err.status(), Some(401) | Some(403) | Some(404))
}

fn reject_credentials(err: ApiError) -> ApiError {
    match err.status() {
        Some(400) | Some(401) => ApiError::InvalidCredentials,
        _ => err,
    }
}
