#![allow(dead_code)]

use std::sync::Arc;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::{header, StatusCode},
    test, App,
};
use serde_json::{json, Value};

use taskkeeper::{
    app::{self, AppServices},
    blob::{MemoryBlobStore, SharedBlobStore},
    db,
};

pub const PASSWORD: &str = "pw123";
pub const BOUNDARY: &str = "----taskkeeper-test-boundary";

/// Services over an in-memory database and blob store. bcrypt runs at its
/// minimum cost to keep the suite fast.
pub async fn test_services() -> (AppServices, Arc<MemoryBlobStore>) {
    let pool = db::memory_pool().await.expect("in-memory database");
    let memory = Arc::new(MemoryBlobStore::new());
    let blobs: SharedBlobStore = memory.clone();
    let services = AppServices::with_settings(pool, blobs, "integration-test-secret", 1, 4);
    (services, memory)
}

pub async fn init_app(
    services: AppServices,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    test::init_service(App::new().configure(move |cfg| app::configure(cfg, &services))).await
}

/// Helper struct to hold auth details
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", self.token))
    }
}

/// Sends `req` and returns the status together with the parsed JSON body
/// (`Value::Null` for an empty body).
pub async fn send(
    app: &impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    req: Request,
) -> (StatusCode, Value) {
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    if body.is_empty() {
        return (status, Value::Null);
    }
    let json = serde_json::from_slice(&body).unwrap_or_else(|_| {
        panic!(
            "Expected JSON body, got: {:?}",
            String::from_utf8_lossy(&body)
        )
    });
    (status, json)
}

pub async fn signup(
    app: &impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    username: &str,
) -> Value {
    let req = test::TestRequest::post()
        .uri("/api/signup/")
        .set_json(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": PASSWORD,
            "full_name": format!("{} Example", username),
        }))
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Signup failed. Body: {}", body);
    body
}

pub async fn login(
    app: &impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    username: &str,
    password: &str,
) -> (StatusCode, Value) {
    let req = test::TestRequest::post()
        .uri("/api/token/")
        .set_json(json!({ "username": username, "password": password }))
        .to_request();
    send(app, req).await
}

pub async fn register_and_login(
    app: &impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    username: &str,
) -> TestUser {
    let profile = signup(app, username).await;
    let (status, body) = login(app, username, PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "Login failed. Body: {}", body);
    assert_eq!(body["user_id"], profile["id"]);

    TestUser {
        id: profile["id"].as_i64().expect("numeric user id"),
        username: username.to_string(),
        token: body["access"].as_str().expect("access token").to_string(),
    }
}

pub async fn create_task(
    app: &impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    user: &TestUser,
    payload: Value,
) -> Value {
    let req = test::TestRequest::post()
        .uri("/api/tasks/")
        .insert_header(user.bearer())
        .set_json(payload)
        .to_request();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED, "Create task failed. Body: {}", body);
    body
}

/// A `multipart/form-data` body with text `fields` and `(name, file_name, content_type, bytes)` files.
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    for (name, file_name, content_type, bytes) in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> (header::HeaderName, String) {
    (
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    )
}
