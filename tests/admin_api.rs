use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use conference_admin::{
    admin_interface::create_admin_router,
    app_state::AppState,
    config::{AdminCredential, Config},
    infrastructure::{Collection, DocumentStore, MemoryDocumentStore},
};

const ADMIN_EMAIL: &str = "admin@rif.dz";
const ADMIN_PASSWORD: &str = "s3cret";

fn test_app() -> (Router, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::new());
    let config = Config::for_memory_store(vec![AdminCredential {
        email: ADMIN_EMAIL.to_string(),
        password: ADMIN_PASSWORD.to_string(),
    }]);
    let state = AppState::with_store(config, store.clone()).unwrap();
    (create_admin_router(state), store)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["session"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_private_routes_require_session() {
    let (app, _) = test_app();
    let response = app.clone().oneshot(get("/programs", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["redirect"], "/login");

    let response = app.oneshot(get("/programs", Some("forged"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_credentials_rejected() {
    let (app, _) = test_app();
    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": "nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_logout_cycle() {
    let (app, _) = test_app();
    let token = login(&app).await;

    let response = app.clone().oneshot(get("/auth/session", Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["session"]["email"], ADMIN_EMAIL);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/auth/logout", Some(&token), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/auth/session", Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_program_create_and_list() {
    let (app, _) = test_app();
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/programs",
            Some(&token),
            json!({
                "type": "session",
                "title": "Machine Learning",
                "date": "2025-05-12",
                "start": "09:00",
                "room": "Amphi A",
                "conferences": [
                    { "title": "Graph models", "presenter": "Dr. Benali", "start": "09:00", "end": "09:30" }
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    let response = app.clone().oneshot(get("/programs", Some(&token))).await.unwrap();
    let programs = body_json(response).await;
    assert_eq!(programs.as_array().unwrap().len(), 1);
    assert_eq!(programs[0]["title"], "Machine Learning");

    let response = app
        .oneshot(json_request("POST", "/programs", Some(&token), json!({ "title": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!id.is_empty());
}

#[tokio::test]
async fn test_clear_requires_exact_phrase() {
    let (app, store) = test_app();
    let token = login(&app).await;
    let mut data = serde_json::Map::new();
    data.insert("title".into(), json!("Welcome"));
    store.add(Collection::Notifications, data).await.unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/database/clear/notifications",
            Some(&token),
            json!({ "confirmation": "clear_notifications" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.count(Collection::Notifications).await.unwrap(), 1);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/database/clear/notifications",
            Some(&token),
            json!({ "confirmation": "CLEAR_NOTIFICATIONS" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["report"]["deleted"], 1);
    assert_eq!(store.count(Collection::Notifications).await.unwrap(), 0);
}

#[tokio::test]
async fn test_protected_collection_is_forbidden() {
    let (app, _) = test_app();
    let token = login(&app).await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/database/clear/users",
            Some(&token),
            json!({ "confirmation": "CLEAR_USERS" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_csv_export_is_a_download() {
    let (app, store) = test_app();
    let token = login(&app).await;
    let mut data = serde_json::Map::new();
    data.insert("name".into(), json!("Prof. Haddad"));
    data.insert("institution".into(), json!("USTHB"));
    store.add(Collection::KeynoteSpeakers, data).await.unwrap();

    let response = app
        .clone()
        .oneshot(get("/database/export/keynote_speakers?format=csv", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/csv"));
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=\"keynote_speakers_"));
    assert!(disposition.ends_with(".csv\""));

    let response = app
        .oneshot(get("/database/export/nonexistent", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
