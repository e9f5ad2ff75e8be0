use std::{collections::HashMap, sync::Arc};

use super::*;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use crate::dashboard::{DashboardState, PollOutcome, PollingDashboardClient};
use shared::domain::StepNumber;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone)]
struct RecordedSave {
    step: u32,
    csrf: Option<String>,
    cookie: Option<String>,
    form: HashMap<String, String>,
}

#[derive(Clone, Default)]
struct ServerState {
    saves: Arc<Mutex<Vec<RecordedSave>>>,
}

async fn handle_save_step(
    State(state): State<ServerState>,
    Path(step): Path<u32>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Json<SaveStepResponse> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    state.saves.lock().await.push(RecordedSave {
        step,
        csrf: header(CSRF_HEADER),
        cookie: header("cookie"),
        form: form.clone(),
    });

    if form.get("department").map(String::as_str) == Some("") {
        let mut errors = shared::error::FieldErrors::new();
        errors.insert(
            "department".to_string(),
            vec!["This field is required.".to_string()],
        );
        return Json(SaveStepResponse::rejected(errors));
    }
    Json(SaveStepResponse::success())
}

async fn handle_analytics() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "total_count": 40,
        "pending_count": 12,
        "approved_count": 25,
        "approval_rate": 62.5
    }))
}

async fn spawn_portal_server(router: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

fn portal_router(state: ServerState) -> Router {
    Router::new()
        .route("/save-step/:step/", post(handle_save_step))
        .route("/analytics_api/", get(handle_analytics))
        .with_state(state)
}

fn submission(step: u32, fields: &[(&str, &str)]) -> StepSubmission {
    StepSubmission {
        step: StepNumber(step),
        fields: fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    }
}

#[test]
fn base_url_gains_trailing_slash_and_resolves_paths_beneath_it() {
    let config = HttpTransportConfig::new("https://portal.example.edu/faculty").expect("config");
    assert_eq!(config.base_url.as_str(), "https://portal.example.edu/faculty/");
    assert_eq!(
        config.resolve("/dashboard/").expect("resolve").as_str(),
        "https://portal.example.edu/faculty/dashboard/"
    );
    assert_eq!(
        config
            .resolve(&save_step_path(StepNumber(2)))
            .expect("resolve")
            .as_str(),
        "https://portal.example.edu/faculty/save-step/2/"
    );
}

#[test]
fn unusable_base_urls_are_config_errors() {
    assert!(matches!(
        HttpTransportConfig::new("  "),
        Err(ClientError::Config(_))
    ));
    assert!(matches!(
        HttpTransportConfig::new("not a url"),
        Err(ClientError::Config(_))
    ));
    assert!(matches!(
        HttpTransportConfig::new("mailto:dean@example.edu"),
        Err(ClientError::Config(_))
    ));
}

#[test]
fn cookie_header_carries_csrf_and_session() {
    let config = HttpTransportConfig::new("http://127.0.0.1:8000").expect("config");
    assert_eq!(config.cookie_header(), None);

    let config = config.with_csrf_token("tok").with_session_id("sess");
    assert_eq!(
        config.cookie_header().as_deref(),
        Some("csrftoken=tok; sessionid=sess")
    );
}

#[tokio::test]
async fn save_step_posts_form_with_csrf_header() {
    let state = ServerState::default();
    let server_url = spawn_portal_server(portal_router(state.clone())).await;
    let transport = HttpPortalTransport::new(
        HttpTransportConfig::new(&server_url)
            .expect("config")
            .with_csrf_token("csrf-123")
            .with_session_id("session-9"),
    )
    .expect("transport");

    let response = transport
        .save_step(&submission(2, &[("department", "Physics"), ("designation", "Professor")]))
        .await
        .expect("save");
    assert!(response.is_success());

    let saves = state.saves.lock().await;
    assert_eq!(saves.len(), 1);
    let saved = &saves[0];
    assert_eq!(saved.step, 2);
    assert_eq!(saved.csrf.as_deref(), Some("csrf-123"));
    assert_eq!(
        saved.cookie.as_deref(),
        Some("csrftoken=csrf-123; sessionid=session-9")
    );
    assert_eq!(saved.form.get("department").map(String::as_str), Some("Physics"));
    assert_eq!(saved.form.get("designation").map(String::as_str), Some("Professor"));
}

#[tokio::test]
async fn save_step_decodes_rejection_with_field_errors() {
    let server_url = spawn_portal_server(portal_router(ServerState::default())).await;
    let transport =
        HttpPortalTransport::new(HttpTransportConfig::new(&server_url).expect("config"))
            .expect("transport");

    let response = transport
        .save_step(&submission(2, &[("department", "")]))
        .await
        .expect("save");
    assert!(!response.is_success());
    assert!(response.errors.contains_key("department"));
}

#[tokio::test]
async fn forbidden_save_is_request_failure() {
    let router = Router::new().route(
        "/save-step/:step/",
        post(|| async { (StatusCode::FORBIDDEN, "CSRF verification failed") }),
    );
    let server_url = spawn_portal_server(router).await;
    let transport =
        HttpPortalTransport::new(HttpTransportConfig::new(&server_url).expect("config"))
            .expect("transport");

    let err = transport
        .save_step(&submission(1, &[]))
        .await
        .expect_err("must fail");
    assert!(err.is_request_failure(), "unexpected error: {err}");
}

#[tokio::test]
async fn fetch_analytics_decodes_stats() {
    let server_url = spawn_portal_server(portal_router(ServerState::default())).await;
    let transport =
        HttpPortalTransport::new(HttpTransportConfig::new(&server_url).expect("config"))
            .expect("transport");

    let snapshot = transport
        .fetch_analytics()
        .await
        .expect("fetch")
        .into_result()
        .expect("stats");
    assert_eq!(snapshot.total_count, 40);
    assert_eq!(snapshot.chart().datapoints(), [25, 12]);
}

#[tokio::test]
async fn undecodable_analytics_body_is_request_failure() {
    let router = Router::new().route("/analytics_api/", get(|| async { "<html>login</html>" }));
    let server_url = spawn_portal_server(router).await;
    let transport =
        HttpPortalTransport::new(HttpTransportConfig::new(&server_url).expect("config"))
            .expect("transport");

    let err = transport.fetch_analytics().await.expect_err("must fail");
    assert!(err.is_request_failure(), "unexpected error: {err}");
}

async fn first_poll_against(router: Router) -> (PollOutcome, DashboardState) {
    let server_url = spawn_portal_server(router).await;
    let transport = Arc::new(
        HttpPortalTransport::new(HttpTransportConfig::new(&server_url).expect("config"))
            .expect("transport"),
    );
    let dashboard = PollingDashboardClient::new(transport);
    let outcome = dashboard.poll().await;
    (outcome, dashboard.state().await)
}

#[tokio::test]
async fn error_body_on_server_error_status_leaves_dashboard_loading() {
    let router = Router::new().route(
        "/analytics_api/",
        get(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "statistics unavailable" })),
            )
        }),
    );

    let (outcome, state) = first_poll_against(router).await;
    assert_eq!(outcome, PollOutcome::Unchanged);
    assert_eq!(state, DashboardState::Loading);
}

#[tokio::test]
async fn structured_error_body_leaves_dashboard_loading() {
    let router = Router::new().route(
        "/analytics_api/",
        get(|| async { Json(serde_json::json!({ "error": { "detail": "db down" } })) }),
    );

    let (outcome, state) = first_poll_against(router).await;
    assert_eq!(outcome, PollOutcome::Unchanged);
    assert_eq!(state, DashboardState::Loading);
}

#[tokio::test]
async fn server_error_without_error_field_is_request_failure() {
    let router = Router::new().route(
        "/analytics_api/",
        get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let server_url = spawn_portal_server(router).await;
    let transport =
        HttpPortalTransport::new(HttpTransportConfig::new(&server_url).expect("config"))
            .expect("transport");

    let err = transport.fetch_analytics().await.expect_err("must fail");
    assert!(err.is_request_failure(), "unexpected error: {err}");
}

#[tokio::test]
async fn unreachable_server_is_request_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let transport = HttpPortalTransport::new(
        HttpTransportConfig::new(&format!("http://{addr}"))
            .expect("config")
            .with_request_timeout(Duration::from_secs(2)),
    )
    .expect("transport");

    let err = transport.fetch_analytics().await.expect_err("must fail");
    assert!(err.is_request_failure(), "unexpected error: {err}");
}
