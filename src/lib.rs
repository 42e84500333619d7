//! # Breakdown Buddy
//!
//! Client for the Breakdown Buddy roadside-assistance service, connecting
//! truck owners with mechanics.
//!
//! ## Features
//! - Login, registration and a persisted session identity
//! - Breakdown requests: file, list, accept, advance status
//! - Per-request chat with polling refresh and a conversation inbox
//! - Notifications, mechanic unread badge and push-token registration
//! - Profile and mechanic service settings
//!
//! ## Architecture
//! - Session store - the identity, handed explicitly to the client
//! - Network layer - HTTP calls (reqwest) and cancellable poll watchers (Tokio)
//! - Auth manager - the signed-in/signed-out state machine

pub mod api;
pub mod auth;
pub mod config;
pub mod constants;
pub mod models;
pub mod network;
pub mod notifications;
pub mod storage;

// Re-export commonly used types
pub use auth::{AuthManager, AuthState};
pub use config::Config;
pub use models::{
    BreakdownRequest, Credentials, IssueType, Message, NewBreakdownRequest, NewMessage,
    Notification, Registration, RequestStatus, Role, User,
};
pub use network::{watch, ApiClient, ApiError, Subscription};
pub use notifications::{Conversation, DashboardStats};
pub use storage::{FileSessionStore, Identity, MemorySessionStore, Session, SessionStore};
