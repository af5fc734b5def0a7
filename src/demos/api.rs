//! Tiny user API served by axum, with an in-process client for tests.

use anyhow::Result;
use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Users keyed by id. Ids are assigned as `len + 1`.
#[derive(Debug, Default)]
pub struct UserStore {
    users: BTreeMap<u64, User>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn add(&mut self, name: &str, email: &str) -> User {
        let id = self.users.len() as u64 + 1;
        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
        };
        self.users.insert(id, user.clone());
        user
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

/// Store shared between the router and whoever owns it.
#[derive(Debug, Clone, Default)]
pub struct SharedStore(Arc<Mutex<UserStore>>);

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, UserStore> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ApiErrorBody {
    error: String,
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ApiErrorBody { error: msg.into() })).into_response()
}

pub fn build_router(store: SharedStore) -> Router {
    Router::new()
        .route("/users/{user_id}", get(get_user))
        .route("/users", post(add_user))
        .with_state(store)
        .layer(TraceLayer::new_for_http())
}

async fn get_user(State(store): State<SharedStore>, Path(user_id): Path<String>) -> Response {
    let user = user_id
        .parse::<u64>()
        .ok()
        .and_then(|id| store.lock().get(id).cloned());
    match user {
        Some(user) => (StatusCode::OK, Json(user)).into_response(),
        None => api_error(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn add_user(State(store): State<SharedStore>, body: Bytes) -> Response {
    let data: Option<Value> = serde_json::from_slice(&body).ok();
    let fields = data.as_ref().and_then(|d| {
        let name = d.get("name")?.as_str()?;
        let email = d.get("email")?.as_str()?;
        Some((name, email))
    });
    match fields {
        Some((name, email)) => {
            let user = store.lock().add(name, email);
            (StatusCode::CREATED, Json(user)).into_response()
        }
        None => api_error(StatusCode::BAD_REQUEST, "Invalid input"),
    }
}

/// Status and decoded JSON body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResponse {
    pub status: u16,
    pub json: Value,
}

/// Drives the router in-process on its own current-thread runtime.
pub struct TestClient {
    router: Router,
    runtime: tokio::runtime::Runtime,
}

impl TestClient {
    pub fn new(store: SharedStore) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            router: build_router(store),
            runtime,
        })
    }

    pub fn get(&self, uri: &str) -> Result<TestResponse> {
        self.send(Request::builder().uri(uri).body(Body::empty())?)
    }

    pub fn post_json(&self, uri: &str, body: &Value) -> Result<TestResponse> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
        )
    }

    fn send(&self, request: Request<Body>) -> Result<TestResponse> {
        self.runtime.block_on(async {
            let response = self.router.clone().oneshot(request).await?;
            let status = response.status().as_u16();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes)?
            };
            Ok(TestResponse { status, json })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_follow_insertion_order() {
        let store = SharedStore::new();
        let client = TestClient::new(store.clone()).unwrap();
        let first = client
            .post_json("/users", &json!({"name": "A", "email": "a@x"}))
            .unwrap();
        let second = client
            .post_json("/users", &json!({"name": "B", "email": "b@x"}))
            .unwrap();
        assert_eq!(first.json["id"], 1);
        assert_eq!(second.json["id"], 2);
        assert_eq!(store.lock().len(), 2);
    }

    #[test]
    fn test_non_numeric_id_is_not_found() {
        let client = TestClient::new(SharedStore::new()).unwrap();
        let res = client.get("/users/abc").unwrap();
        assert_eq!(res.status, 404);
        assert_eq!(res.json, json!({"error": "User not found"}));
    }

    #[tokio::test]
    async fn test_router_returns_created_user() {
        let store = SharedStore::new();
        let app = build_router(store.clone());
        let request = Request::builder()
            .method("POST")
            .uri("/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"Ada","email":"ada@x"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(store.lock().get(1).map(|u| u.name.as_str()), Some("Ada"));
    }

    #[test]
    fn test_malformed_body_is_invalid_input() {
        let client = TestClient::new(SharedStore::new()).unwrap();
        let res = client.post_json("/users", &json!("not an object")).unwrap();
        assert_eq!(res.status, 400);
        assert_eq!(res.json, json!({"error": "Invalid input"}));
    }
}
