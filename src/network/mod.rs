//! Network layer - session-authenticated HTTP calls and polling watchers
//!
//! The client attaches the persisted identity to every call; watchers
//! re-run calls on a fixed interval until their owner cancels them.

pub mod client;
pub mod poller;

pub use client::{ApiClient, ApiError};
pub use poller::{watch, Subscription};
