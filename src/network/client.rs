//! HTTP client wrapper - attaches the session identity and maps failures

use std::time::Instant;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::constants::AUTH_HEADER;
use crate::models::HttpMethod;
use crate::storage::{Session, StorageError};

/// Every way a call can fail. None of them are retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API Error: {status}")]
    Http { status: u16, body: String },

    #[error("User not authenticated")]
    AuthRequired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),

    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Alert text naming the failed action. Status codes stay in the log.
    pub fn user_message(&self, action: &str) -> String {
        match self {
            ApiError::AuthRequired => format!("Please log in to {action}"),
            ApiError::InvalidCredentials => String::from("Invalid username or password"),
            ApiError::MissingField(_) => String::from("Please fill in all required fields"),
            ApiError::PasswordTooShort(min) => {
                format!("Password must be at least {min} characters long")
            }
            ApiError::Network(_) => {
                format!("Failed to {action}. Check your connection and try again.")
            }
            _ => format!("Failed to {action}. Please try again."),
        }
    }
}

/// Session-authenticated client for the Breakdown Buddy REST API
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(config: &Config, session: Session) -> Result<Self, ApiError> {
        if config.api_base().is_empty() {
            return Err(ApiError::Config("api_url is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(ApiClient {
            http,
            base_url: config.api_base().to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Build a request, reading the persisted identity fresh
    fn build_request(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<String>,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let mut req_builder = match method {
            HttpMethod::GET => self.http.get(url),
            HttpMethod::POST => self.http.post(url),
            HttpMethod::PUT => self.http.put(url),
            HttpMethod::PATCH => self.http.patch(url),
            HttpMethod::DELETE => self.http.delete(url),
        };

        req_builder = req_builder
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json");

        if let Some(identity) = self.session.identity()? {
            req_builder = req_builder.header(AUTH_HEADER, identity.user_id);
        }

        if let Some(body) = body {
            if method.has_body() {
                req_builder = req_builder.body(body);
            }
        }

        Ok(req_builder)
    }

    /// Execute one call. Any non-2xx status is an error carrying that status.
    pub async fn call<B>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint);
        let body = body.map(serde_json::to_string).transpose()?;
        let req_builder = self.build_request(method, &url, body)?;

        tracing::info!("API Request: {} {}", method.as_str(), url);
        let start = Instant::now();

        let resp = match req_builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_timeout() {
                    tracing::error!(%url, "Request timed out");
                } else if e.is_connect() {
                    tracing::error!(%url, error = %e, "Connection failed");
                } else {
                    tracing::error!(%url, error = %e, "Request failed");
                }
                return Err(ApiError::Network(e));
            }
        };

        let status = resp.status();
        let text = resp.text().await?;
        let elapsed = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            tracing::error!("API Error: {} - {}", status.as_u16(), text);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        tracing::info!(status = status.as_u16(), time_ms = elapsed, "API Response");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// `call` decoding into `T`
    pub async fn call_json<T, B>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let value = self.call(method, endpoint, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.call_json::<T, ()>(HttpMethod::GET, endpoint, None).await
    }

    pub(crate) async fn send_json<T, B>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.call_json(method, endpoint, Some(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> Config {
        Config {
            api_url: url.into(),
            ..Config::default()
        }
    }

    #[test]
    fn test_empty_url_is_config_error() {
        let err = ApiClient::new(&config("  "), Session::in_memory()).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn test_trailing_slash_stripped() {
        let client = ApiClient::new(&config("http://localhost:5000/api/"), Session::in_memory())
            .unwrap();
        assert_eq!(client.url("/auth/user"), "http://localhost:5000/api/auth/user");
    }

    #[test]
    fn test_user_message_hides_status() {
        let err = ApiError::Http {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.status(), Some(500));
        let msg = err.user_message("update status");
        assert_eq!(msg, "Failed to update status. Please try again.");
        assert!(!msg.contains("500"));
        assert_eq!(
            ApiError::AuthRequired.user_message("submit a request"),
            "Please log in to submit a request"
        );
    }
}
