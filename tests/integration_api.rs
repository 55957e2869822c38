use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, SecondsFormat, Utc};
use meetline::api::ApiServer;
use meetline::{AppState, CallProvider, Config, Database, StreamCallProvider, StreamConfig, UserProfile};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CALL_PATH: &str = r"^/video/call/default/meeting-[0-9a-f-]+$";
const RECORDINGS_PATH: &str = r"^/video/call/default/meeting-[0-9a-f-]+/recordings$";

async fn app_with_stream(server: &MockServer) -> AppState {
    let temp_file = NamedTempFile::new().unwrap();
    let (_, path) = temp_file.keep().unwrap();
    let db = Arc::new(
        Database::open(&format!("sqlite:{}", path.to_str().unwrap()))
            .await
            .unwrap(),
    );
    db.upsert_user(&UserProfile {
        first_name: Some("Rui".to_string()),
        ..UserProfile::new("user_rui", "rui@example.com")
    })
    .await
    .unwrap();

    let stream = StreamConfig::new("api-key", "api-secret").with_base_url(&server.uri());
    let config = Config {
        stream: Some(stream.clone()),
        ..Config::default()
    };
    let provider = StreamCallProvider::new(stream, config.provider_timeout).await.unwrap();

    AppState::new(db, Some(Arc::new(provider) as Arc<dyn CallProvider>), &config).unwrap()
}

async fn call(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = ApiServer::router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_create_then_list_through_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(CALL_PATH))
        .and(query_param("api_key", "api-key"))
        .and(header("stream-auth-type", "jwt"))
        .and(body_partial_json(json!({
            "data": {
                "created_by_id": "user_rui",
                "custom": { "title": "Launch review", "duration": 45, "hostName": "Rui" }
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "created": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(CALL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "call": {
                "ended_at": null,
                "session": { "started_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true) }
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(RECORDINGS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "recordings": [] })))
        .mount(&server)
        .await;

    let state = app_with_stream(&server).await;

    let starts = (Utc::now() + Duration::hours(2)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let create = Request::builder()
        .method("POST")
        .uri("/api/meetings")
        .header("x-auth-user-id", "user_rui")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "title": "Launch review", "scheduledFor": starts, "duration": 45 }).to_string(),
        ))
        .unwrap();
    let (status, created) = call(&state, create).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["meeting"]["status"], "SCHEDULED");
    assert_eq!(created["meeting"]["host"]["externalId"], "user_rui");
    assert_eq!(created["meeting"]["participants"], json!([]));
    let call_id = created["meeting"]["streamCallId"].as_str().unwrap().to_string();
    assert!(call_id.starts_with("meeting-"));

    let list = Request::builder()
        .uri("/api/meetings/upcoming")
        .header("x-auth-user-id", "user_rui")
        .body(Body::empty())
        .unwrap();
    let (status, listing) = call(&state, list).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["meetings"][0]["streamCallId"], call_id.as_str());
    assert_eq!(listing["meetings"][0]["status"], "ONGOING");
    assert_eq!(listing["meetings"][0]["computed"]["hasRecording"], false);
    assert_eq!(listing["meta"]["failed"], 0);
}

#[tokio::test]
async fn test_create_rejects_bad_input_without_calling_stream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let state = app_with_stream(&server).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/meetings")
        .header("x-auth-user-id", "user_rui")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "title": "Launch review", "scheduledFor": "tomorrow-ish", "duration": 45 }).to_string(),
        ))
        .unwrap();

    let (status, body) = call(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Invalid date format" }));
}

#[tokio::test]
async fn test_stream_outage_surfaces_on_create_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let state = app_with_stream(&server).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/meetings")
        .header("x-auth-user-id", "user_rui")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "title": "Retro", "scheduledFor": "2031-05-01T09:00:00Z", "duration": 30 }).to_string(),
        ))
        .unwrap();

    let (status, body) = call(&state, request).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Call provider request failed");

    let list = Request::builder()
        .uri("/api/meetings/upcoming")
        .header("x-auth-user-id", "user_rui")
        .body(Body::empty())
        .unwrap();
    let (status, listing) = call(&state, list).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listing["meetings"].as_array().unwrap().is_empty());
}
