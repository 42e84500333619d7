use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LATITUDE, DEFAULT_LONGITUDE, DEFAULT_URGENCY, MIN_PASSWORD_LEN};

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
        }
    }

    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH)
    }
}

/// Server-assigned participant kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TruckOwner,
    Mechanic,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::TruckOwner => "truck_owner",
            Role::Mechanic => "mechanic",
        }
    }
}

/// A user as returned by the server. Only `id` is guaranteed; login
/// responses may carry a partial record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
}

impl User {
    pub fn is_mechanic(&self) -> bool {
        self.role == Some(Role::Mechanic)
    }

    pub fn is_truck_owner(&self) -> bool {
        self.role == Some(Role::TruckOwner)
    }
}

/// Lifecycle of a breakdown request. Transitions are decided by the server,
/// so unknown values are kept rather than rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    Other(String),
}

impl RequestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Other(s) => s,
        }
    }

    /// Counted as active on the dashboard
    pub fn is_active(&self) -> bool {
        !matches!(self, RequestStatus::Completed)
    }

    /// The step a mechanic can move an assigned job to
    pub fn next_for_mechanic(&self) -> Option<RequestStatus> {
        match self {
            RequestStatus::Accepted => Some(RequestStatus::InProgress),
            RequestStatus::InProgress => Some(RequestStatus::Completed),
            _ => None,
        }
    }
}

impl From<String> for RequestStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => RequestStatus::Pending,
            "accepted" => RequestStatus::Accepted,
            "in_progress" => RequestStatus::InProgress,
            "completed" => RequestStatus::Completed,
            "cancelled" => RequestStatus::Cancelled,
            _ => RequestStatus::Other(value),
        }
    }
}

impl From<RequestStatus> for String {
    fn from(value: RequestStatus) -> Self {
        value.as_str().to_string()
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RequestStatus::from(s.to_string()))
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalogue of issue types offered when filing a request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    EngineFailure,
    Transmission,
    Hydraulics,
    AirBrakes,
    Electrical,
    TireBlowout,
    FuelSystem,
    Trailer,
    Pneumatics,
    Other,
    Unknown(String),
}

impl IssueType {
    pub const ALL: [IssueType; 10] = [
        IssueType::EngineFailure,
        IssueType::Transmission,
        IssueType::Hydraulics,
        IssueType::AirBrakes,
        IssueType::Electrical,
        IssueType::TireBlowout,
        IssueType::FuelSystem,
        IssueType::Trailer,
        IssueType::Pneumatics,
        IssueType::Other,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            IssueType::EngineFailure => "engine_failure",
            IssueType::Transmission => "transmission",
            IssueType::Hydraulics => "hydraulics",
            IssueType::AirBrakes => "air_brakes",
            IssueType::Electrical => "electrical",
            IssueType::TireBlowout => "tire_blowout",
            IssueType::FuelSystem => "fuel_system",
            IssueType::Trailer => "trailer",
            IssueType::Pneumatics => "pneumatics",
            IssueType::Other => "other",
            IssueType::Unknown(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            IssueType::EngineFailure => "Engine Failure",
            IssueType::Transmission => "Transmission Issues",
            IssueType::Hydraulics => "Hydraulic Problems",
            IssueType::AirBrakes => "Air Brake System",
            IssueType::Electrical => "Electrical Issues",
            IssueType::TireBlowout => "Tire Blowout",
            IssueType::FuelSystem => "Fuel System",
            IssueType::Trailer => "Trailer Problem",
            IssueType::Pneumatics => "Pneumatics (Air)",
            IssueType::Other => "Other Issue",
            IssueType::Unknown(s) => s,
        }
    }
}

impl From<String> for IssueType {
    fn from(value: String) -> Self {
        IssueType::ALL
            .into_iter()
            .find(|t| t.as_str() == value)
            .unwrap_or(IssueType::Unknown(value))
    }
}

impl From<IssueType> for String {
    fn from(value: IssueType) -> Self {
        value.as_str().to_string()
    }
}

impl std::str::FromStr for IssueType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(IssueType::from(s.to_string()))
    }
}

/// A roadside-assistance request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownRequest {
    pub id: i64,
    pub issue_type: IssueType,
    #[serde(default)]
    pub description: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
    pub truck_owner_id: i64,
    #[serde(default)]
    pub mechanic_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl BreakdownRequest {
    /// The other party in this request's chat, if one is assigned yet
    pub fn receiver_for(&self, user: &User) -> Option<i64> {
        if user.is_truck_owner() {
            self.mechanic_id
        } else {
            Some(self.truck_owner_id)
        }
    }

    pub fn sender_label(&self, sender_id: i64) -> &'static str {
        if sender_id == self.truck_owner_id {
            "Truck Owner"
        } else if Some(sender_id) == self.mechanic_id {
            "Mechanic"
        } else {
            "Unknown"
        }
    }

    /// Mechanics see open jobs plus their own; owners see everything they filed
    pub fn visible_to(&self, user: &User) -> bool {
        if user.is_mechanic() {
            self.status == RequestStatus::Pending || self.mechanic_id == Some(user.id)
        } else {
            self.truck_owner_id == user.id
        }
    }

    /// Owner of the request or the mechanic assigned to it
    pub fn involves(&self, user: &User) -> bool {
        self.truck_owner_id == user.id || self.mechanic_id == Some(user.id)
    }

    pub fn can_chat(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Accepted | RequestStatus::InProgress
        )
    }
}

/// A chat message attached to a request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub request_id: i64,
    pub sender_id: i64,
    #[serde(default)]
    pub receiver_id: Option<i64>,
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_message_type() -> String {
    String::from("text")
}

/// A server-side notification record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "message")]
    pub body: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub request_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response from login and registration
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn missing_field(&self) -> Option<&'static str> {
        if self.username.trim().is_empty() {
            Some("username")
        } else if self.password.is_empty() {
            Some("password")
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub full_name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
}

impl Registration {
    /// First required form field left blank, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
            ("fullName", &self.full_name),
            ("phone", &self.phone),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    pub fn password_too_short(&self) -> bool {
        self.password.chars().count() < MIN_PASSWORD_LEN
    }
}

/// Payload for filing a new breakdown request
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBreakdownRequest {
    pub issue_type: IssueType,
    pub description: String,
    pub location: String,
    pub urgency: String,
    pub latitude: String,
    pub longitude: String,
    pub truck_owner_id: i64,
}

impl NewBreakdownRequest {
    pub fn new(
        truck_owner_id: i64,
        issue_type: IssueType,
        description: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        NewBreakdownRequest {
            issue_type,
            description: description.into(),
            location: location.into(),
            urgency: String::from(DEFAULT_URGENCY),
            latitude: String::from(DEFAULT_LATITUDE),
            longitude: String::from(DEFAULT_LONGITUDE),
            truck_owner_id,
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude.to_string();
        self.longitude = longitude.to_string();
        self
    }

    pub fn missing_field(&self) -> Option<&'static str> {
        if self.issue_type.as_str().is_empty() {
            Some("issueType")
        } else if self.description.trim().is_empty() {
            Some("description")
        } else if self.location.trim().is_empty() {
            Some("location")
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub request_id: i64,
    pub sender_id: i64,
    pub receiver_id: Option<i64>,
    pub content: String,
    pub message_type: String,
}

impl NewMessage {
    /// A text message from `sender` on `request`, addressed to the counterpart.
    /// Unassigned requests send with no receiver and the server routes it.
    pub fn text(request: &BreakdownRequest, sender: &User, content: impl Into<String>) -> Self {
        let content: String = content.into();
        NewMessage {
            request_id: request.id,
            sender_id: sender.id,
            receiver_id: request.receiver_for(sender),
            content: content.trim().to_string(),
            message_type: default_message_type(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTokenRegistration {
    pub user_id: i64,
    pub token: String,
    pub platform: String,
    pub is_active: bool,
}

/// Partial profile edit; unset fields are left alone server-side
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.location.is_none()
            && self.business_name.is_none()
    }
}

/// Mechanic service settings
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MechanicProfile {
    pub user_id: i64,
    pub business_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    pub specialties: Vec<String>,
    pub service_regions: Vec<String>,
    pub service_radius: u32,
    pub is_available: bool,
    pub accept_outside_area_notifications: bool,
    pub max_travel_distance: u32,
}

impl MechanicProfile {
    /// Settings seeded from the user record: available, 50 km radius
    pub fn for_user(user: &User) -> Self {
        MechanicProfile {
            user_id: user.id,
            business_type: user
                .business_type
                .clone()
                .unwrap_or_else(|| String::from("individual")),
            business_name: user.business_name.clone(),
            specialties: Vec::new(),
            service_regions: Vec::new(),
            service_radius: 50,
            is_available: true,
            accept_outside_area_notifications: true,
            max_travel_distance: 50,
        }
    }

    pub fn with_radius(mut self, radius: u32) -> Self {
        self.service_radius = radius;
        self.max_travel_distance = radius;
        self
    }

    pub fn missing_field(&self) -> Option<&'static str> {
        if self.service_regions.is_empty() {
            Some("serviceRegions")
        } else {
            None
        }
    }
}
