//! Session-authenticated client against an in-process stub backend

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

use breakdown_buddy::constants::AUTH_HEADER;
use breakdown_buddy::{
    ApiClient, ApiError, AuthManager, AuthState, Config, Credentials, FileSessionStore, Identity,
    MemorySessionStore, RequestStatus, Session, SessionStore,
};

/// What the stub saw
#[derive(Clone, Default)]
struct Stub {
    auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
    messages: Arc<Mutex<Vec<Value>>>,
}

impl Stub {
    fn record(&self, headers: &HeaderMap) {
        let value = headers
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth_headers.lock().unwrap().push(value);
    }

    fn headers(&self) -> Vec<Option<String>> {
        self.auth_headers.lock().unwrap().clone()
    }

    fn last_body(&self) -> Value {
        self.bodies.lock().unwrap().last().cloned().unwrap_or(Value::Null)
    }
}

async fn login(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    stub.record(&headers);
    if body["username"] == "bob" && body["password"] == "x" {
        Json(json!({ "token": "t", "user": { "id": 7 } })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid credentials" }))).into_response()
    }
}

async fn current_user(State(stub): State<Stub>, headers: HeaderMap) -> Response {
    stub.record(&headers);
    match headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok()) {
        Some("7") => Json(json!({
            "id": 7,
            "username": "bob",
            "email": "bob@example.com",
            "role": "truck_owner"
        }))
        .into_response(),
        Some("8") => (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response(),
        _ => (StatusCode::UNAUTHORIZED, "Not authenticated").into_response(),
    }
}

async fn active_requests(State(stub): State<Stub>, headers: HeaderMap) -> Response {
    stub.record(&headers);
    Json(json!([{
        "id": 11,
        "issueType": "tire_blowout",
        "status": "pending",
        "location": "N3 Heidelberg",
        "truckOwnerId": 7
    }]))
    .into_response()
}

async fn owner_requests(Path(owner): Path<i64>) -> Json<Value> {
    Json(json!([
        {
            "id": 21,
            "issueType": "air_brakes",
            "status": "accepted",
            "location": "N1 Polokwane",
            "truckOwnerId": owner,
            "mechanicId": 4
        },
        {
            "id": 22,
            "issueType": "electrical",
            "status": "pending",
            "location": "Durban harbour",
            "truckOwnerId": owner
        }
    ]))
}

async fn boom(State(stub): State<Stub>, headers: HeaderMap) -> Response {
    stub.record(&headers);
    (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response()
}

async fn accept(
    State(stub): State<Stub>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    stub.bodies.lock().unwrap().push(body.clone());
    Json(json!({ "id": id, "status": "accepted", "mechanicId": body["mechanicId"] }))
}

async fn update_status(
    State(stub): State<Stub>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    stub.bodies.lock().unwrap().push(body.clone());
    Json(json!({ "id": id, "status": body["status"] }))
}

async fn push_tokens(State(stub): State<Stub>, Json(body): Json<Value>) -> StatusCode {
    stub.bodies.lock().unwrap().push(body);
    StatusCode::CREATED
}

async fn list_messages(State(stub): State<Stub>, Path(id): Path<i64>) -> Json<Value> {
    let messages = stub.messages.lock().unwrap();
    Json(Value::Array(
        messages
            .iter()
            .filter(|m| m["requestId"] == id)
            .cloned()
            .collect(),
    ))
}

async fn send_message(State(stub): State<Stub>, Json(body): Json<Value>) -> Json<Value> {
    let mut messages = stub.messages.lock().unwrap();
    let mut message = body;
    message["id"] = json!(messages.len() + 1);
    messages.push(message.clone());
    Json(message)
}

async fn start_stub() -> (String, Stub) {
    let stub = Stub::default();
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/user", get(current_user))
        .route("/api/requests/active", get(active_requests))
        .route("/api/requests/truck-owner/{id}", get(owner_requests))
        .route("/api/requests/{id}/accept", post(accept))
        .route("/api/requests/{id}/status", put(update_status))
        .route("/api/push-tokens", post(push_tokens))
        .route("/api/messages/request/{id}", get(list_messages))
        .route("/api/messages", post(send_message))
        .route("/api/boom", get(boom))
        .with_state(stub.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/api"), stub)
}

fn client(base_url: &str, session: Session) -> ApiClient {
    let config = Config {
        api_url: base_url.to_string(),
        timeout_secs: 5,
        ..Config::default()
    };
    ApiClient::new(&config, session).unwrap()
}

#[tokio::test]
async fn test_login_persists_user_id_and_sends_header() {
    let (url, stub) = start_stub().await;
    let session = Session::in_memory();
    let mut auth = AuthManager::new(client(&url, session.clone()));

    let user = auth
        .authenticate(&Credentials::new("bob", "x"))
        .await
        .unwrap();
    assert_eq!(user.id, 7);
    assert!(auth.is_authenticated());
    assert_eq!(
        session.identity().unwrap(),
        Some(Identity::new("7", Some("t".into())))
    );

    auth.client().current_user().await.unwrap();
    assert_eq!(stub.headers().last().unwrap().as_deref(), Some("7"));
}

#[tokio::test]
async fn test_login_call_itself_carries_no_identity() {
    let (url, stub) = start_stub().await;
    let mut auth = AuthManager::new(client(&url, Session::in_memory()));

    auth.authenticate(&Credentials::new("bob", "x")).await.unwrap();
    assert_eq!(stub.headers(), vec![None]);
}

#[tokio::test]
async fn test_clear_session_stops_sending_header() {
    let (url, stub) = start_stub().await;
    let mut auth = AuthManager::new(client(&url, Session::in_memory()));
    auth.authenticate(&Credentials::new("bob", "x")).await.unwrap();

    auth.client().active_requests().await.unwrap();
    auth.clear_session().unwrap();
    auth.clear_session().unwrap();
    assert_eq!(auth.state(), &AuthState::Unauthenticated);

    auth.client().active_requests().await.unwrap();
    let err = auth.client().current_user().await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    let headers = stub.headers();
    assert_eq!(headers[1].as_deref(), Some("7"));
    assert_eq!(headers[2], None);
    assert_eq!(headers[3], None);
}

#[tokio::test]
async fn test_sequential_calls_reuse_the_same_identity() {
    let (url, stub) = start_stub().await;
    let session = Session::new(MemorySessionStore::with_identity(Identity::new("7", None)));
    let api = client(&url, session);

    api.current_user().await.unwrap();
    api.active_requests().await.unwrap();

    assert_eq!(
        stub.headers(),
        vec![Some("7".to_string()), Some("7".to_string())]
    );
}

#[tokio::test]
async fn test_identity_is_read_before_every_call() {
    let (url, stub) = start_stub().await;
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
    let api = client(&url, Session::from_store(store.clone()));

    api.active_requests().await.unwrap();
    store.save(&Identity::new("12", None)).unwrap();
    api.active_requests().await.unwrap();

    assert_eq!(stub.headers(), vec![None, Some("12".to_string())]);
}

#[tokio::test]
async fn test_http_errors_surface_their_status() {
    let (url, _stub) = start_stub().await;
    let api = client(&url, Session::in_memory());

    let unauthorized = api.current_user().await.unwrap_err();
    assert!(matches!(unauthorized, ApiError::Http { status: 401, .. }));

    let missing = api.call::<()>(breakdown_buddy::models::HttpMethod::GET, "/nowhere", None)
        .await
        .unwrap_err();
    assert!(matches!(missing, ApiError::Http { status: 404, .. }));
}

#[tokio::test]
async fn test_server_error_leaves_identity_unchanged() {
    let (url, _stub) = start_stub().await;
    let identity = Identity::new("7", Some("t".into()));
    let session = Session::new(MemorySessionStore::with_identity(identity.clone()));
    let api = client(&url, session.clone());

    let err = api
        .call::<()>(breakdown_buddy::models::HttpMethod::GET, "/boom", None)
        .await
        .unwrap_err();
    match err {
        ApiError::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "database unavailable");
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
    assert_eq!(session.identity().unwrap(), Some(identity));
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let (url, _stub) = start_stub().await;
    let session = Session::in_memory();
    let mut auth = AuthManager::new(client(&url, session.clone()));

    let err = auth
        .authenticate(&Credentials::new("bob", "wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidCredentials));
    assert_eq!(auth.state(), &AuthState::Unauthenticated);
    assert_eq!(session.identity().unwrap(), None);
}

#[tokio::test]
async fn test_unreachable_server_is_network_failure() {
    // Grab a free port, then close it
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(&format!("http://{addr}/api"), Session::in_memory());
    let err = api.active_requests().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
}

#[tokio::test]
async fn test_restore_trusts_only_confirmed_sessions() {
    let (url, _stub) = start_stub().await;

    let good = Session::new(MemorySessionStore::with_identity(Identity::new("7", None)));
    let mut auth = AuthManager::new(client(&url, good));
    assert!(auth.restore().await.unwrap());
    assert_eq!(auth.user().unwrap().username, "bob");

    let stale = Session::new(MemorySessionStore::with_identity(Identity::new("99", None)));
    let mut auth = AuthManager::new(client(&url, stale.clone()));
    assert!(!auth.restore().await.unwrap());
    assert_eq!(auth.state(), &AuthState::Unauthenticated);
    assert_eq!(stale.identity().unwrap(), None);
}

#[tokio::test]
async fn test_restore_keeps_identity_through_server_error() {
    let (url, _stub) = start_stub().await;
    let session = Session::new(MemorySessionStore::with_identity(Identity::new(
        "8",
        Some("t".into()),
    )));
    let mut auth = AuthManager::new(client(&url, session.clone()));

    let err = auth.restore().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(auth.state(), &AuthState::Unauthenticated);
    assert_eq!(
        session.identity().unwrap(),
        Some(Identity::new("8", Some("t".into())))
    );
}

#[tokio::test]
async fn test_file_session_survives_a_new_client() {
    let (url, stub) = start_stub().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.yaml");

    let mut auth = AuthManager::new(client(&url, Session::file(&path)));
    auth.authenticate(&Credentials::new("bob", "x")).await.unwrap();

    // Fresh process, same file
    let store = FileSessionStore::new(&path);
    assert_eq!(store.load().unwrap().unwrap().user_id, "7");
    let mut restored = AuthManager::new(client(&url, Session::new(store)));
    assert!(restored.restore().await.unwrap());
    assert_eq!(stub.headers().last().unwrap().as_deref(), Some("7"));
}

#[tokio::test]
async fn test_mutation_payloads() {
    let (url, stub) = start_stub().await;
    let session = Session::new(MemorySessionStore::with_identity(Identity::new("7", None)));
    let api = client(&url, session);

    let echo = api.accept_request(11, 4).await.unwrap();
    assert_eq!(stub.last_body(), json!({ "mechanicId": 4 }));
    assert_eq!(echo["status"], "accepted");

    api.update_request_status(11, &RequestStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(stub.last_body(), json!({ "status": "in_progress" }));

    // 201 with an empty body
    let value = api
        .register_push_token("ExponentPushToken[abc]", "android")
        .await
        .unwrap();
    assert_eq!(value, Value::Null);
    assert_eq!(
        stub.last_body(),
        json!({
            "userId": 7,
            "token": "ExponentPushToken[abc]",
            "platform": "android",
            "isActive": true
        })
    );
}

#[tokio::test]
async fn test_watch_messages_sees_new_messages() {
    let (url, _stub) = start_stub().await;
    let session = Session::new(MemorySessionStore::with_identity(Identity::new("7", None)));
    let api = client(&url, session);
    let mut auth = AuthManager::new(api.clone());
    assert!(auth.restore().await.unwrap());
    let user = auth.user().cloned().unwrap();

    let request = api.active_requests().await.unwrap().remove(0);
    let mut subscription = api.watch_messages(request.id, Duration::from_millis(50));

    let first = subscription.recv().await.unwrap().unwrap();
    assert!(first.is_empty());

    let sent = api
        .send_message(&breakdown_buddy::NewMessage::text(&request, &user, "  On my way  "))
        .await
        .unwrap();
    assert_eq!(sent.content, "On my way");
    assert_eq!(sent.receiver_id, None);

    let seen = loop {
        let messages = subscription.recv().await.unwrap().unwrap();
        if !messages.is_empty() {
            break messages;
        }
    };
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].sender_id, 7);

    subscription.cancel();
    while subscription.recv().await.is_some() {}
}

#[tokio::test]
async fn test_inbox_counts_unread_from_the_other_party() {
    let (url, stub) = start_stub().await;
    stub.messages.lock().unwrap().extend([
        json!({ "id": 1, "requestId": 21, "senderId": 4, "content": "Leaving now", "createdAt": "2024-05-01T08:00:00Z" }),
        json!({ "id": 2, "requestId": 21, "senderId": 7, "content": "Thanks", "createdAt": "2024-05-01T08:01:00Z" }),
        json!({ "id": 3, "requestId": 21, "senderId": 4, "content": "10 min out", "isRead": false, "createdAt": "2024-05-01T08:20:00Z" }),
    ]);
    let session = Session::new(MemorySessionStore::with_identity(Identity::new("7", None)));
    let mut auth = AuthManager::new(client(&url, session));
    assert!(auth.restore().await.unwrap());
    let user = auth.user().cloned().unwrap();

    let inbox = auth.client().inbox(&user).await.unwrap();
    let ids: Vec<i64> = inbox.iter().map(|c| c.request_id).collect();
    assert_eq!(ids, vec![21, 22]);
    assert_eq!(inbox[0].unread, 2);
    assert_eq!(inbox[0].last_message.as_deref(), Some("10 min out"));
    assert_eq!(inbox[0].other_label(), "Mechanic");
    assert_eq!(inbox[1].last_message, None);
}
