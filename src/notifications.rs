//! Views derived from notifications, request lists and chat threads

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::constants::NEW_REQUEST_NOTIFICATION;
use crate::models::{BreakdownRequest, IssueType, Message, Notification, RequestStatus, Role, User};

/// Unread `new_request` notifications; drives the mechanic badge
pub fn unread_new_requests(notifications: &[Notification]) -> usize {
    notifications
        .iter()
        .filter(|n| !n.is_read && n.kind == NEW_REQUEST_NOTIFICATION)
        .count()
}

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}

/// Only mechanics get a request badge
pub fn badge_applies(user: &User) -> bool {
    user.is_mechanic()
}

/// Badge value for `user`; always zero for truck owners
pub fn badge_count(user: &User, notifications: &[Notification]) -> usize {
    if badge_applies(user) {
        unread_new_requests(notifications)
    } else {
        0
    }
}

/// Home screen counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub active_requests: usize,
    pub completed_jobs: usize,
    pub unread_messages: usize,
}

impl DashboardStats {
    pub fn from_parts(requests: &[BreakdownRequest], notifications: &[Notification]) -> Self {
        DashboardStats {
            active_requests: requests.iter().filter(|r| r.status.is_active()).count(),
            completed_jobs: requests
                .iter()
                .filter(|r| r.status == RequestStatus::Completed)
                .count(),
            unread_messages: unread_count(notifications),
        }
    }
}

/// One inbox row: a request's chat thread seen from one participant
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    pub request_id: i64,
    pub issue_type: IssueType,
    pub location: String,
    pub status: RequestStatus,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Unread messages from the other party
    pub unread: usize,
    pub other_role: Role,
}

impl Conversation {
    pub fn other_label(&self) -> &'static str {
        match self.other_role {
            Role::Mechanic => "Mechanic",
            Role::TruckOwner => "Truck Owner",
        }
    }
}

/// Build the inbox for `user`, newest thread first. Requests the user is not
/// part of, or whose messages are absent from `messages_by_request`, are
/// skipped. Threads with no messages sort last.
pub fn conversations(
    user: &User,
    requests: &[BreakdownRequest],
    messages_by_request: &HashMap<i64, Vec<Message>>,
) -> Vec<Conversation> {
    let mut inbox: Vec<Conversation> = requests
        .iter()
        .filter(|r| r.involves(user))
        .filter_map(|r| {
            let messages = messages_by_request.get(&r.id)?;
            let last = messages.last();
            Some(Conversation {
                request_id: r.id,
                issue_type: r.issue_type.clone(),
                location: r.location.clone(),
                status: r.status.clone(),
                last_message: last.map(|m| m.content.clone()),
                last_message_at: last.and_then(|m| m.created_at),
                unread: messages
                    .iter()
                    .filter(|m| !m.is_read && m.sender_id != user.id)
                    .count(),
                other_role: if r.truck_owner_id == user.id {
                    Role::Mechanic
                } else {
                    Role::TruckOwner
                },
            })
        })
        .collect();

    // None < Some, so reversing puts undated threads at the end
    inbox.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    inbox
}
