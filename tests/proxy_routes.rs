use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use quitcoach::auth::TokenVerifier;
use quitcoach::db::profile_repository::ProfileSource;
use quitcoach::errors::AppError;
use quitcoach::models::{MessageMetadata, ProxyAction, RichReply, UserProfile};
use quitcoach::routes::build_router;
use quitcoach::runtime::{DialogRuntime, RuntimeTurn};
use quitcoach::service::proxy_service::ProxyService;

// ── Test doubles ──────────────────────────────────────────────────────────────

struct FakeVerifier;

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> Result<String, AppError> {
        match token {
            "token-1" => Ok("user-1".to_string()),
            "token-2" => Ok("user-2".to_string()),
            _ => Err(AppError::InvalidCredentials),
        }
    }
}

#[derive(Default)]
struct FakeRuntime {
    fail_with: Option<u16>,
    actions: Mutex<Vec<(String, ProxyAction)>>,
}

#[async_trait]
impl DialogRuntime for FakeRuntime {
    async fn interact(&self, user_id: &str, action: &ProxyAction) -> Result<RuntimeTurn, AppError> {
        self.actions.lock().unwrap().push((user_id.to_string(), action.clone()));
        if let Some(status) = self.fail_with {
            return Err(AppError::UpstreamStatus { status, body: "runtime down".into() });
        }
        Ok(RuntimeTurn {
            messages: vec![
                RichReply { text: "Hey!".into(), metadata: None, quick_replies: vec![] },
                RichReply { text: "Stay strong.".into(), metadata: Some(MessageMetadata::crisis()), quick_replies: vec![] },
            ],
            is_ending: false,
        })
    }
}

struct FakeProfiles;

#[async_trait]
impl ProfileSource for FakeProfiles {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok((user_id == "user-1").then(|| UserProfile {
            quit_date: Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()),
            motivation: Some("breathe easier".into()),
            substance_type: Some("vape".into()),
            daily_usage: Some(200),
            triggers: vec!["boredom".into()],
        }))
    }
}

fn service(runtime: Arc<FakeRuntime>) -> ProxyService {
    ProxyService::new(Arc::new(FakeVerifier), runtime)
}

fn coach_request(token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/coach")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn call(svc: ProxyService, req: Request<Body>) -> (StatusCode, Value) {
    let resp = build_router(svc).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn relays_text_turn() {
    let runtime = Arc::new(FakeRuntime::default());
    let body = json!({ "action": { "type": "text", "payload": "I want to smoke" }, "userId": "user-1" });

    let (status, json) = call(service(runtime.clone()), coach_request(Some("token-1"), body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["isEnding"], false);
    assert_eq!(json["messages"][0]["text"], "Hey!");
    assert_eq!(json["messages"][1]["metadata"]["messageType"], "crisis");

    let actions = runtime.actions.lock().unwrap();
    assert_eq!(actions[0].0, "user-1");
    assert_eq!(actions[0].1, ProxyAction::text("I want to smoke"));
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let runtime = Arc::new(FakeRuntime::default());
    let body = json!({ "action": { "type": "launch" }, "userId": "user-1" });

    let (status, json) = call(service(runtime.clone()), coach_request(None, body)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].is_string());
    assert!(runtime.actions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let body = json!({ "action": { "type": "launch" }, "userId": "user-1" });
    let (status, _) = call(service(Arc::default()), coach_request(Some("expired"), body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lowercase_bearer_scheme_is_accepted() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/coach")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "bearer token-1")
        .body(Body::from(json!({ "action": { "type": "launch" }, "userId": "user-1" }).to_string()))
        .unwrap();
    let (status, _) = call(service(Arc::default()), req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn token_for_another_user_is_forbidden() {
    let runtime = Arc::new(FakeRuntime::default());
    let body = json!({ "action": { "type": "text", "payload": "hi" }, "userId": "user-1" });

    let (status, _) = call(service(runtime.clone()), coach_request(Some("token-2"), body)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(runtime.actions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let no_action = json!({ "userId": "user-1" });
    let (status, json) = call(service(Arc::default()), coach_request(Some("token-1"), no_action)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["details"].as_str().unwrap().contains("action"));

    let no_user = json!({ "action": { "type": "launch" } });
    let (status, json) = call(service(Arc::default()), coach_request(Some("token-1"), no_user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["details"].as_str().unwrap().contains("userId"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/coach")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer token-1")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = call(service(Arc::default()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upstream_failure_is_a_gateway_error() {
    let runtime = Arc::new(FakeRuntime { fail_with: Some(500), ..Default::default() });
    let body = json!({ "action": { "type": "text", "payload": "hi" }, "userId": "user-1" });

    let (status, json) = call(service(runtime), coach_request(Some("token-1"), body)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].is_string());
    assert!(json.get("success").is_none());
}

#[tokio::test]
async fn launch_is_enriched_from_user_context() {
    let runtime = Arc::new(FakeRuntime::default());
    let body = json!({
        "action": { "type": "launch" },
        "userId": "user-1",
        "userContext": { "motivation": "my daughter", "substanceType": "cigarettes", "daysSinceQuit": 12 }
    });

    let (status, _) = call(service(runtime.clone()), coach_request(Some("token-1"), body)).await;

    assert_eq!(status, StatusCode::OK);
    let actions = runtime.actions.lock().unwrap();
    let payload = actions[0].1.payload.as_ref().unwrap();
    assert_eq!(payload["motivation"], "my daughter");
    assert_eq!(payload["substanceType"], "cigarettes");
    assert_eq!(payload["daysSinceQuit"], 12);
}

#[tokio::test]
async fn launch_without_context_falls_back_to_stored_profile() {
    let runtime = Arc::new(FakeRuntime::default());
    let svc = service(runtime.clone()).with_profiles(Arc::new(FakeProfiles));
    let body = json!({ "action": { "type": "launch" }, "userId": "user-1" });

    let (status, _) = call(svc, coach_request(Some("token-1"), body)).await;

    assert_eq!(status, StatusCode::OK);
    let actions = runtime.actions.lock().unwrap();
    let payload = actions[0].1.payload.as_ref().unwrap();
    assert_eq!(payload["motivation"], "breathe easier");
    assert_eq!(payload["dailyUsage"], 200);
    assert_eq!(payload["quitDate"], "2026-02-01T00:00:00Z");
}

#[tokio::test]
async fn health_reports_ok() {
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, json) = call(service(Arc::default()), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}
