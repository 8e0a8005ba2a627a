//! End-to-end tests against an in-process backend on a loopback port.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use taskdesk::config::ClientConfig;
use taskdesk::net::auth::AuthApi;
use taskdesk::net::error::ErrorKind;
use taskdesk::net::tasks::TaskApi;
use taskdesk::net::types::{Credentials, TaskDraft};
use taskdesk::net::ApiClient;
use taskdesk::state::{
    FileTokenStore, MemoryTokenStore, NoopNavigator, SessionController, SessionPhase, TaskList, TokenStore,
};

const TOKEN: &str = "tok-1";
const CREATED_AT: &str = "2024-03-01T12:00:00";

// =============================================================================
// MOCK BACKEND
// =============================================================================

#[derive(Default)]
struct Backend {
    tasks: Mutex<Vec<Value>>,
    next_id: Mutex<i64>,
    me_calls: Mutex<usize>,
}

type Shared = Arc<Backend>;

fn user_json(email: &str) -> Value {
    json!({ "id": "u1", "email": email, "created_at": CREATED_AT })
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn sign_up(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if email == "taken@example.com" {
        return detail(StatusCode::CONFLICT, "Email already registered");
    }
    if body["password"].as_str().unwrap_or_default().len() < 8 {
        let fields = json!({ "detail": [{
            "loc": ["body", "password"],
            "msg": "String should have at least 8 characters",
            "type": "string_too_short"
        }]});
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(fields)).into_response();
    }
    (StatusCode::CREATED, Json(json!({ "user": user_json(email), "token": TOKEN }))).into_response()
}

async fn sign_in(Json(body): Json<Value>) -> Response {
    if body["password"] == "password1" {
        let email = body["email"].as_str().unwrap_or_default();
        Json(json!({ "user": user_json(email), "token": TOKEN })).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Incorrect email or password")
    }
}

async fn me(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    *backend.me_calls.lock().unwrap() += 1;
    if authorized(&headers) {
        Json(user_json("a@example.com")).into_response()
    } else {
        detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
    }
}

async fn list_tasks(State(backend): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    Json(Value::Array(backend.tasks.lock().unwrap().clone())).into_response()
}

async fn create_task(State(backend): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }
    let mut next = backend.next_id.lock().unwrap();
    *next += 1;
    let task = json!({
        "id": *next,
        "title": body["title"],
        "description": body.get("description").cloned().unwrap_or(Value::Null),
        "completed": false,
        "owner_user_id": "u1",
        "created_at": CREATED_AT,
        "updated_at": CREATED_AT
    });
    backend.tasks.lock().unwrap().push(task.clone());
    (StatusCode::CREATED, Json(task)).into_response()
}

fn with_task(backend: &Backend, id: i64, edit: impl FnOnce(&mut Value)) -> Response {
    let mut tasks = backend.tasks.lock().unwrap();
    match tasks.iter_mut().find(|t| t["id"] == id) {
        Some(task) => {
            edit(task);
            Json(task.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, "Task not found"),
    }
}

async fn get_task(State(backend): State<Shared>, Path(id): Path<i64>) -> Response {
    if id == 503 {
        return (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response();
    }
    with_task(&backend, id, |_| {})
}

async fn update_task(State(backend): State<Shared>, Path(id): Path<i64>, Json(body): Json<Value>) -> Response {
    with_task(&backend, id, |task| {
        task["title"] = body["title"].clone();
        task["description"] = body.get("description").cloned().unwrap_or(Value::Null);
    })
}

async fn delete_task(State(backend): State<Shared>, Path(id): Path<i64>) -> Response {
    let mut tasks = backend.tasks.lock().unwrap();
    let before = tasks.len();
    tasks.retain(|t| t["id"] != id);
    if tasks.len() == before {
        detail(StatusCode::NOT_FOUND, "Task not found")
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn complete_task(State(backend): State<Shared>, Path(id): Path<i64>, Json(body): Json<Value>) -> Response {
    with_task(&backend, id, |task| task["completed"] = body["completed"].clone())
}

async fn spawn_backend() -> (SocketAddr, Shared) {
    let backend = Shared::default();
    let app = Router::new()
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/signin", post(sign_in))
        .route("/api/auth/me", get(me))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", get(get_task).put(update_task).delete(delete_task))
        .route("/api/tasks/{id}/complete", patch(complete_task))
        .with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

fn client(addr: SocketAddr, tokens: Arc<dyn TokenStore>) -> Arc<ApiClient> {
    let config = ClientConfig::from_lookup(|_| None).unwrap().with_api_url(&format!("http://{addr}/")).unwrap();
    Arc::new(ApiClient::new(&config, tokens).unwrap())
}

// =============================================================================
// ApiClient
// =============================================================================

#[tokio::test]
async fn bearer_token_is_attached_when_present() {
    let (addr, _) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let api = client(addr, tokens.clone());

    let err = api.fetch_current_user().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(err.to_string(), "Could not validate credentials");

    tokens.set(TOKEN);
    let user = api.fetch_current_user().await.unwrap();
    assert_eq!(user.email, "a@example.com");
    assert_eq!(user.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
}

#[tokio::test]
async fn duplicate_sign_up_is_a_conflict() {
    let (addr, _) = spawn_backend().await;
    let api = client(addr, Arc::new(MemoryTokenStore::new()));

    let err = api.sign_up(&Credentials::new("taken@example.com", "password1")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "Email already registered");
}

#[tokio::test]
async fn field_validation_errors_are_surfaced() {
    let (addr, _) = spawn_backend().await;
    let api = client(addr, Arc::new(MemoryTokenStore::new()));

    let err = api.sign_up(&Credentials::new("a@example.com", "short")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.field_errors()[0].field().as_deref(), Some("password"));
    assert_eq!(err.to_string(), "String should have at least 8 characters");
}

#[tokio::test]
async fn gateway_failure_is_transport() {
    let (addr, _) = spawn_backend().await;
    let api = client(addr, Arc::new(MemoryTokenStore::with_token(TOKEN)));

    let err = api.get_task(503).await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.detail(), "upstream down");
}

#[tokio::test]
async fn missing_task_is_not_found() {
    let (addr, _) = spawn_backend().await;
    let api = client(addr, Arc::new(MemoryTokenStore::with_token(TOKEN)));

    let err = api.get_task(42).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "Task not found");
}

#[tokio::test]
async fn closed_port_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let api = client(addr, Arc::new(MemoryTokenStore::with_token(TOKEN)));

    let err = api.fetch_current_user().await.unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.status(), None);
    assert_eq!(err.to_string(), "Network error. Please check your connection.");
}

// =============================================================================
// SESSION
// =============================================================================

#[tokio::test]
async fn sign_in_persists_token_and_survives_restart() {
    let (addr, backend) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskdesk").join("auth_token");

    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&path));
    let api = client(addr, tokens.clone());
    let session = SessionController::start(api, tokens, Arc::new(NoopNavigator)).await;
    assert_eq!(session.snapshot().phase(), SessionPhase::Anonymous);
    assert_eq!(*backend.me_calls.lock().unwrap(), 0);

    let user = session.sign_in(&Credentials::new("a@example.com", "password1")).await.unwrap();
    assert_eq!(user.email, "a@example.com");
    assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), TOKEN);

    // A fresh process restores the session from disk.
    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&path));
    let api = client(addr, tokens.clone());
    let restored = SessionController::start(api, tokens, Arc::new(NoopNavigator)).await;
    assert!(restored.snapshot().is_authenticated());
    assert_eq!(*backend.me_calls.lock().unwrap(), 1);

    restored.sign_out();
    assert!(!path.exists());
}

#[tokio::test]
async fn rejected_stored_token_is_cleared_on_bootstrap() {
    let (addr, _) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::with_token("stale"));
    let api = client(addr, tokens.clone());

    let session = SessionController::start(api, tokens.clone(), Arc::new(NoopNavigator)).await;

    assert_eq!(session.snapshot().phase(), SessionPhase::Anonymous);
    assert!(!tokens.exists());
    assert!(!session.has_unverified_token());
}

#[tokio::test]
async fn unreachable_backend_keeps_stored_token() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let tokens = Arc::new(MemoryTokenStore::with_token(TOKEN));
    let api = client(addr, tokens.clone());

    let session = SessionController::start(api, tokens.clone(), Arc::new(NoopNavigator)).await;

    assert_eq!(session.snapshot().phase(), SessionPhase::Anonymous);
    assert_eq!(tokens.get().as_deref(), Some(TOKEN));
    assert!(session.has_unverified_token());
}

// =============================================================================
// TASKS
// =============================================================================

#[tokio::test]
async fn task_lifecycle_through_task_list() {
    let (addr, _) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let api = client(addr, tokens.clone());
    let session = Arc::new(SessionController::start(api.clone(), tokens, Arc::new(NoopNavigator)).await);
    session.sign_in(&Credentials::new("a@example.com", "password1")).await.unwrap();
    let list = TaskList::new(api, session);

    let created = list
        .create(&TaskDraft { title: "Write report".into(), description: Some("Q1".into()) })
        .await
        .unwrap();
    assert_eq!(created.title, "Write report");
    assert_eq!(list.snapshot().open_count(), 1);

    let done = list.set_completed(created.id, true).await.unwrap();
    assert!(done.completed);
    assert_eq!(list.snapshot().completed_count(), 1);

    let renamed = list
        .update(created.id, &TaskDraft { title: "Write final report".into(), description: None })
        .await
        .unwrap();
    assert_eq!(renamed.description, None);
    assert_eq!(list.get(created.id).await.unwrap().title, "Write final report");

    list.delete(created.id).await.unwrap();
    assert!(list.snapshot().tasks.is_empty());

    let err = list.delete(created.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn revoked_token_during_task_call_signs_out() {
    let (addr, _) = spawn_backend().await;
    let tokens = Arc::new(MemoryTokenStore::new());
    let api = client(addr, tokens.clone());
    let session = Arc::new(SessionController::start(api.clone(), tokens.clone(), Arc::new(NoopNavigator)).await);
    session.sign_in(&Credentials::new("a@example.com", "password1")).await.unwrap();
    let list = TaskList::new(api, session.clone());

    // Swap the token out from under the session, as an expiry would.
    tokens.set("revoked");
    let err = list.refresh().await.unwrap_err();

    assert!(err.is_auth_error());
    assert_eq!(session.snapshot().phase(), SessionPhase::Anonymous);
    assert!(!tokens.exists());
}
