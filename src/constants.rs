//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

use std::time::Duration;

/// Default backend base URL; endpoint paths are appended verbatim
pub const DEFAULT_API_URL: &str =
    "https://4bccefca-e72e-4637-8984-305b73f30f6d-00-x53yc5gqc13k.riker.replit.dev/api";

/// Header carrying the persisted user id on every authenticated call
pub const AUTH_HEADER: &str = "x-demo-auth";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Chat refresh interval
pub const MESSAGE_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Notification badge refresh interval
pub const NOTIFICATION_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Outcomes a watcher may buffer before it waits on the subscriber
pub const WATCH_BUFFER: usize = 8;

/// Per-user directory under $HOME
pub const CONFIG_DIR_NAME: &str = ".breakdown-buddy";
pub const CONFIG_FILE: &str = "config.yaml";
pub const SESSION_FILE: &str = "session.yaml";
pub const LOG_FILE: &str = "breakdown-buddy.log";

/// Johannesburg, used when a request is filed without GPS coordinates
pub const DEFAULT_LATITUDE: &str = "-26.2041";
pub const DEFAULT_LONGITUDE: &str = "28.0473";

/// Urgency the backend expects on new requests
pub const DEFAULT_URGENCY: &str = "medium";

/// Shortest password accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// Notification type counted by the mechanic badge
pub const NEW_REQUEST_NOTIFICATION: &str = "new_request";

/// Application name
pub const APP_NAME: &str = "Breakdown Buddy";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
