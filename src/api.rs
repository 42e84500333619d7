//! Typed operations over the remote collections
//!
//! Each method is one REST call. Mutations hand back whatever the server
//! echoes; callers re-fetch instead of patching local copies.

use std::collections::HashMap;

use futures_util::future::join_all;
use serde_json::{json, Value};

use crate::constants::MIN_PASSWORD_LEN;
use crate::models::{
    AuthResponse, BreakdownRequest, Credentials, HttpMethod, MechanicProfile, Message,
    NewBreakdownRequest, NewMessage, Notification, ProfileUpdate, PushTokenRegistration,
    Registration, RequestStatus, User,
};
use crate::network::client::{ApiClient, ApiError};
use crate::notifications::{conversations, Conversation};

impl ApiClient {
    /// Persisted user id as the number the server keys on
    pub fn require_user_id(&self) -> Result<i64, ApiError> {
        self.session()
            .user_id()?
            .and_then(|id| id.trim().parse().ok())
            .ok_or(ApiError::AuthRequired)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse, ApiError> {
        if let Some(field) = credentials.missing_field() {
            return Err(ApiError::MissingField(field));
        }
        self.send_json(HttpMethod::POST, "/auth/login", credentials)
            .await
    }

    pub async fn register(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        if let Some(field) = registration.missing_field() {
            return Err(ApiError::MissingField(field));
        }
        if registration.password_too_short() {
            return Err(ApiError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        tracing::info!(username = %registration.username, role = registration.role.as_str(), "Registering");
        self.send_json(HttpMethod::POST, "/auth/register", registration)
            .await
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get_json("/auth/user").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        self.send_json(HttpMethod::PUT, "/auth/profile", update).await
    }

    // =========================================================================
    // Breakdown requests
    // =========================================================================

    pub async fn active_requests(&self) -> Result<Vec<BreakdownRequest>, ApiError> {
        self.get_json("/requests/active").await
    }

    pub async fn owner_requests(&self, user_id: i64) -> Result<Vec<BreakdownRequest>, ApiError> {
        self.get_json(&format!("/requests/truck-owner/{user_id}"))
            .await
    }

    pub async fn mechanic_requests(
        &self,
        user_id: i64,
    ) -> Result<Vec<BreakdownRequest>, ApiError> {
        self.get_json(&format!("/requests/mechanic/{user_id}")).await
    }

    /// The request list a user works from: owners get their own, mechanics get
    /// open jobs plus the ones assigned to them
    pub async fn requests_for(&self, user: &User) -> Result<Vec<BreakdownRequest>, ApiError> {
        if user.is_mechanic() {
            let requests = self.active_requests().await?;
            Ok(requests.into_iter().filter(|r| r.visible_to(user)).collect())
        } else {
            self.owner_requests(user.id).await
        }
    }

    pub async fn create_request(
        &self,
        request: &NewBreakdownRequest,
    ) -> Result<BreakdownRequest, ApiError> {
        if let Some(field) = request.missing_field() {
            return Err(ApiError::MissingField(field));
        }
        self.send_json(HttpMethod::POST, "/requests", request).await
    }

    pub async fn accept_request(&self, request_id: i64, mechanic_id: i64) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::POST,
            &format!("/requests/{request_id}/accept"),
            Some(&json!({ "mechanicId": mechanic_id })),
        )
        .await
    }

    pub async fn update_request_status(
        &self,
        request_id: i64,
        status: &RequestStatus,
    ) -> Result<Value, ApiError> {
        self.call(
            HttpMethod::PUT,
            &format!("/requests/{request_id}/status"),
            Some(&json!({ "status": status.as_str() })),
        )
        .await
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub async fn messages(&self, request_id: i64) -> Result<Vec<Message>, ApiError> {
        self.get_json(&format!("/messages/request/{request_id}"))
            .await
    }

    pub async fn send_message(&self, message: &NewMessage) -> Result<Message, ApiError> {
        if message.content.trim().is_empty() {
            return Err(ApiError::MissingField("content"));
        }
        self.send_json(HttpMethod::POST, "/messages", message).await
    }

    /// Chat threads for every request `user` takes part in. A thread whose
    /// messages fail to load is left out.
    pub async fn inbox(&self, user: &User) -> Result<Vec<Conversation>, ApiError> {
        let requests: Vec<BreakdownRequest> = if user.is_mechanic() {
            self.active_requests().await?
        } else {
            self.owner_requests(user.id).await?
        }
        .into_iter()
        .filter(|r| r.involves(user))
        .collect();

        let fetches = requests.iter().map(|r| async move {
            match self.messages(r.id).await {
                Ok(messages) => Some((r.id, messages)),
                Err(e) => {
                    tracing::warn!(request_id = r.id, error = %e, "Failed to load messages");
                    None
                }
            }
        });
        let messages_by_request: HashMap<i64, Vec<Message>> =
            join_all(fetches).await.into_iter().flatten().collect();

        Ok(conversations(user, &requests, &messages_by_request))
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub async fn register_push_token(&self, token: &str, platform: &str) -> Result<Value, ApiError> {
        let registration = PushTokenRegistration {
            user_id: self.require_user_id()?,
            token: token.to_string(),
            platform: platform.to_string(),
            is_active: true,
        };
        self.call(HttpMethod::POST, "/push-tokens", Some(&registration))
            .await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>, ApiError> {
        self.get_json("/notifications").await
    }

    // =========================================================================
    // Mechanics
    // =========================================================================

    pub async fn save_mechanic_profile(&self, profile: &MechanicProfile) -> Result<Value, ApiError> {
        if let Some(field) = profile.missing_field() {
            return Err(ApiError::MissingField(field));
        }
        self.call(HttpMethod::POST, "/mechanics", Some(profile)).await
    }
}
