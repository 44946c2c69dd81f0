use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::analyzer::OpenRouterClient;
use psmf_core::analysis::{AnalysisError, AnalysisRequest, FoodAnalyzer, strip_data_url_prefix};
use psmf_core::calendar::CalendarDay;
use psmf_core::dashboard::Dashboard;
use psmf_core::models::{
    CustomHabit, DayLog, FoodEntry, HabitState, HabitUpdate, Macros, NewProfile, ProfileUpdate,
    UserProfile, validate_custom_habit_name, validate_profile,
};
use psmf_core::scoring::ComplianceReport;
use psmf_core::service::PsmfService;

const BODY_LIMIT: usize = 20 * 1024 * 1024; // 20 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<PsmfService>>,
    analyzer: Option<Arc<dyn FoodAnalyzer>>,
    api_key: Option<String>,
}

impl AppState {
    fn lock(&self) -> MutexGuard<'_, PsmfService> {
        self.svc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateEntryRequest {
    text: Option<String>,
    image_base64: Option<String>,
    caption: Option<String>,
}

#[derive(Deserialize)]
struct CreateCustomHabitRequest {
    name: String,
}

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
struct TodayQuery {
    today: Option<String>,
}

#[derive(Serialize)]
struct StateResponse {
    profile: Option<UserProfile>,
    entries: Vec<FoodEntry>,
    habits: HabitState,
    macros: Macros,
    goals: Macros,
    compliance: ComplianceReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    sleep_hours: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::EmptyRequest | AnalysisError::NotFood => Self::BadRequest(err.to_string()),
            other => {
                tracing::warn!(error = %other, "food analysis failed");
                Self::BadGateway(other.to_string())
            }
        }
    }
}

fn no_profile() -> ApiError {
    ApiError::Conflict("No profile yet. Complete onboarding first".to_string())
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(format!("{err:#}"))
}

fn parse_date_param(value: Option<&str>) -> Result<NaiveDate, ApiError> {
    match value {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD"))),
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers: state and profile ---

async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    let svc = state.lock();
    Json(StateResponse {
        profile: svc.profile().cloned(),
        entries: svc.entries().to_vec(),
        habits: svc.habits().clone(),
        macros: svc.current_macros(),
        goals: *svc.goals(),
        compliance: svc.compliance(),
        sleep_hours: svc.sleep_hours(),
    })
}

async fn create_profile(
    State(state): State<AppState>,
    Json(req): Json<NewProfile>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    validate_profile(&req.clone().into()).map_err(|e| bad_request(&e))?;
    let mut svc = state.lock();
    let profile = svc.onboard(req).context("failed to store profile")?;
    Ok((StatusCode::CREATED, Json(profile.clone())))
}

async fn update_profile(
    State(state): State<AppState>,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let mut svc = state.lock();
    let current = svc.profile().ok_or_else(no_profile)?;
    validate_profile(&req.apply_to(current)).map_err(|e| bad_request(&e))?;
    let profile = svc.update_profile(&req).context("failed to update profile")?;
    Ok(Json(profile.clone()))
}

// --- Handlers: food entries ---

fn analysis_request(req: CreateEntryRequest) -> Result<AnalysisRequest, ApiError> {
    let request = match req.image_base64.filter(|b| !b.trim().is_empty()) {
        Some(image) => {
            STANDARD
                .decode(strip_data_url_prefix(image.trim()))
                .map_err(|_| ApiError::BadRequest("image_base64 is not valid base64".to_string()))?;
            AnalysisRequest::image(image.trim(), req.caption.or(req.text).as_deref())
        }
        None => AnalysisRequest {
            text: req.text,
            ..AnalysisRequest::default()
        },
    };
    request.validate()?;
    Ok(request)
}

async fn create_entry(
    State(state): State<AppState>,
    Json(req): Json<CreateEntryRequest>,
) -> Result<(StatusCode, Json<FoodEntry>), ApiError> {
    if state.lock().profile().is_none() {
        return Err(no_profile());
    }
    let request = analysis_request(req)?;
    let analyzer = state.analyzer.clone().ok_or_else(|| {
        ApiError::BadGateway("Food analysis is not configured (set PSMF_AI_API_KEY)".to_string())
    })?;

    // Analyse without holding the lock; the entry is added only on success.
    let result = analyzer.analyze(&request).await?;

    let mut svc = state.lock();
    if svc.profile().is_none() {
        return Err(no_profile());
    }
    let entry = svc
        .add_analyzed_entry(result)
        .context("failed to add entry")?;
    Ok((StatusCode::CREATED, Json(entry.clone())))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut svc = state.lock();
    if svc.remove_entry(&id).context("failed to delete entry")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Entry {id} not found")))
    }
}

// --- Handlers: habits ---

async fn patch_habits(
    State(state): State<AppState>,
    Json(req): Json<HabitUpdate>,
) -> Result<Json<HabitState>, ApiError> {
    let mut svc = state.lock();
    req.apply_to(svc.habits()).map_err(|e| bad_request(&e))?;
    let habits = svc.update_habits(&req).context("failed to update habits")?;
    Ok(Json(habits.clone()))
}

async fn add_water(State(state): State<AppState>) -> Result<Json<HabitState>, ApiError> {
    let mut svc = state.lock();
    let habits = svc.add_water().context("failed to add water")?;
    Ok(Json(habits.clone()))
}

async fn create_custom_habit(
    State(state): State<AppState>,
    Json(req): Json<CreateCustomHabitRequest>,
) -> Result<(StatusCode, Json<CustomHabit>), ApiError> {
    validate_custom_habit_name(&req.name).map_err(|e| bad_request(&e))?;
    let mut svc = state.lock();
    let habit = svc
        .add_custom_habit(&req.name)
        .context("failed to add habit")?;
    Ok((StatusCode::CREATED, Json(habit)))
}

async fn toggle_custom_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CustomHabit>, ApiError> {
    let mut svc = state.lock();
    if !svc
        .toggle_custom_habit(&id)
        .context("failed to toggle habit")?
    {
        return Err(ApiError::NotFound(format!("Habit {id} not found")));
    }
    svc.habits()
        .custom_habits
        .iter()
        .find(|h| h.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Habit {id} not found")))
}

async fn delete_custom_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut svc = state.lock();
    if svc
        .remove_custom_habit(&id)
        .context("failed to remove habit")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Habit {id} not found")))
    }
}

// --- Handlers: day lifecycle, history, calendar ---

async fn finish_day(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<DayLog>, ApiError> {
    let date = parse_date_param(query.date.as_deref())?;
    let mut svc = state.lock();
    svc.finish_day(date)
        .context("failed to finish day")?
        .map(Json)
        .ok_or_else(no_profile)
}

async fn get_history(State(state): State<AppState>) -> Json<Vec<DayLog>> {
    Json(state.lock().history())
}

async fn get_history_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DayLog>, ApiError> {
    let date = parse_date_param(Some(&date))?;
    state
        .lock()
        .day_log(date)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No archived day for {date}")))
}

async fn get_calendar(
    State(state): State<AppState>,
    Query(query): Query<TodayQuery>,
) -> Result<Json<Vec<CalendarDay>>, ApiError> {
    let today = parse_date_param(query.today.as_deref())?;
    let svc = state.lock();
    if svc.profile().is_none() {
        return Err(no_profile());
    }
    Ok(Json(svc.calendar(today)?))
}

async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<TodayQuery>,
) -> Result<Json<Dashboard>, ApiError> {
    let today = parse_date_param(query.today.as_deref())?;
    let svc = state.lock();
    if svc.profile().is_none() {
        return Err(no_profile());
    }
    Ok(Json(svc.dashboard(today)?))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/profile", post(create_profile).patch(update_profile))
        .route("/api/entries", post(create_entry))
        .route("/api/entries/{id}", delete(delete_entry))
        .route("/api/habits", patch(patch_habits))
        .route("/api/habits/water", post(add_water))
        .route("/api/habits/custom", post(create_custom_habit))
        .route("/api/habits/custom/{id}/toggle", post(toggle_custom_habit))
        .route("/api/habits/custom/{id}", delete(delete_custom_habit))
        .route("/api/finish", post(finish_day))
        .route("/api/history", get(get_history))
        .route("/api/history/{date}", get(get_history_day))
        .route("/api/calendar", get(get_calendar))
        .route("/api/dashboard", get(get_dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: PsmfService,
    analyzer: Option<OpenRouterClient>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        analyzer: analyzer.map(|a| Arc::new(a) as Arc<dyn FoodAnalyzer>),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        if !new_api_key {
            eprintln!(
                "API key: {}...{} (see api_key file in data directory)",
                &key[..4],
                &key[key.len() - 4..],
            );
        }
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    eprintln!("Listening on http://{bind}:{port}");
    tracing::info!(%bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use psmf_core::analysis::{AnalysisResult, parse_analysis_content};
    use tower::ServiceExt;

    struct MockAnalyzer {
        content: &'static str,
    }

    #[async_trait]
    impl FoodAnalyzer for MockAnalyzer {
        async fn analyze(
            &self,
            request: &AnalysisRequest,
        ) -> Result<AnalysisResult, AnalysisError> {
            request.validate()?;
            parse_analysis_content(self.content, request.fallback_name())
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl FoodAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
            Err(AnalysisError::Api {
                status: 429,
                body: "rate limited".to_string(),
            })
        }
    }

    const CHICKEN: &str =
        r#"{"name": "Chicken breast", "calories": 330, "protein": 62, "fat": 7, "carbs": 0}"#;

    const PROFILE: &str = r#"{"start_date": "2024-06-01", "target_date": "2024-07-31",
        "height_cm": 180, "start_weight": 95, "target_weight": 85, "age": 34, "gender": "male"}"#;

    fn test_state_with(api_key: Option<String>, analyzer: Option<Arc<dyn FoodAnalyzer>>) -> AppState {
        AppState {
            svc: Arc::new(Mutex::new(PsmfService::new_in_memory().unwrap())),
            analyzer,
            api_key,
        }
    }

    fn test_state(api_key: Option<String>) -> AppState {
        test_state_with(api_key, Some(Arc::new(MockAnalyzer { content: CHICKEN })))
    }

    fn test_app(api_key: Option<String>) -> Router {
        build_router(test_state(api_key))
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Option<&str>) -> Response {
        let builder = axum::http::Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        build_router(state.clone()).oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn onboarded_state() -> AppState {
        let state = test_state(None);
        let response = send(&state, "POST", "/api/profile", Some(PROFILE)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        state
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/state")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_wrong_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/state")
                    .header("Authorization", "Bearer wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/state")
                    .header("Authorization", "Bearer test-key-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn no_auth_mode_allows_requests() {
        let state = test_state(None);
        let response = send(&state, "GET", "/api/state", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["profile"].is_null());
        assert_eq!(json["compliance"]["score"], 0);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let state = test_state(None);
        let response = send(&state, "GET", "/api/history", None).await;

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn security_headers_on_auth_failure() {
        let app = test_app(Some("secret".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/state")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = test_app(None);

        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/entries")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret database path /home/user/.psmf/db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(!json["error"].as_str().unwrap().contains("secret"));
    }

    #[tokio::test]
    async fn onboard_and_read_state() {
        let state = onboarded_state().await;
        let json = body_json(send(&state, "GET", "/api/state", None).await).await;
        assert_eq!(json["profile"]["current_weight"], 95.0);
        assert_eq!(json["goals"]["protein"], 200.0);
        assert!(json["entries"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn onboard_invalid_profile_returns_400() {
        let state = test_state(None);
        let bad = PROFILE.replace(r#""age": 34"#, r#""age": 12"#);
        let response = send(&state, "POST", "/api/profile", Some(&bad)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.lock().profile().is_none());
    }

    #[tokio::test]
    async fn patch_profile() {
        let state = test_state(None);
        let response = send(&state, "PATCH", "/api/profile", Some(r#"{"current_weight": 93}"#)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let state = onboarded_state().await;
        let response = send(&state, "PATCH", "/api/profile", Some(r#"{"current_weight": 93}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["current_weight"], 93.0);

        let response = send(&state, "PATCH", "/api/profile", Some(r#"{"height_cm": 0}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_entry_adds_analysed_food() {
        let state = onboarded_state().await;
        let response = send(&state, "POST", "/api/entries", Some(r#"{"text": "chicken 300g"}"#)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let entry = body_json(response).await;
        assert_eq!(entry["name"], "Chicken breast");

        let json = body_json(send(&state, "GET", "/api/state", None).await).await;
        assert_eq!(json["macros"]["protein"], 62.0);
        assert_eq!(json["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_entry_with_image() {
        let state = onboarded_state().await;
        let response = send(
            &state,
            "POST",
            "/api/entries",
            Some(r#"{"image_base64": "data:image/jpeg;base64,QUJD", "caption": "lunch"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            &state,
            "POST",
            "/api/entries",
            Some(r#"{"image_base64": "not base64!!"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_entry_errors() {
        // No profile yet
        let state = test_state(None);
        let response = send(&state, "POST", "/api/entries", Some(r#"{"text": "eggs"}"#)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // Empty request
        let state = onboarded_state().await;
        let response = send(&state, "POST", "/api/entries", Some(r#"{"text": "  "}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Not food
        let state = test_state_with(None, Some(Arc::new(MockAnalyzer { content: "null" })));
        send(&state, "POST", "/api/profile", Some(PROFILE)).await;
        let response = send(&state, "POST", "/api/entries", Some(r#"{"text": "a rock"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.lock().entries().is_empty());

        // Upstream failure
        let state = test_state_with(None, Some(Arc::new(FailingAnalyzer)));
        send(&state, "POST", "/api/profile", Some(PROFILE)).await;
        let response = send(&state, "POST", "/api/entries", Some(r#"{"text": "eggs"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(state.lock().entries().is_empty());

        // Analysis not configured
        let state = test_state_with(None, None);
        send(&state, "POST", "/api/profile", Some(PROFILE)).await;
        let response = send(&state, "POST", "/api/entries", Some(r#"{"text": "eggs"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn delete_entry_returns_204_then_404() {
        let state = onboarded_state().await;
        let entry = body_json(send(&state, "POST", "/api/entries", Some(r#"{"text": "chicken"}"#)).await).await;
        let uri = format!("/api/entries/{}", entry["id"].as_str().unwrap());

        assert_eq!(send(&state, "DELETE", &uri, None).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&state, "DELETE", &uri, None).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_habits_updates_fields() {
        let state = onboarded_state().await;
        let response = send(
            &state,
            "PATCH",
            "/api/habits",
            Some(r#"{"water_ml": 3000, "steps": 12000, "omega3": 4, "multivitamin": true,
                    "sleep_start": "23:00", "sleep_end": "07:00"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let habits = body_json(response).await;
        assert_eq!(habits["water_ml"], 3000);
        assert_eq!(habits["sleep_end"], "07:00");

        let json = body_json(send(&state, "GET", "/api/state", None).await).await;
        assert_eq!(json["compliance"]["met_count"], 4);
        assert_eq!(json["sleep_hours"], 8.0);
    }

    #[tokio::test]
    async fn patch_habits_rejects_invalid_without_changes() {
        let state = onboarded_state().await;
        for body in [
            r#"{"water_ml": 500, "omega3": 5}"#,
            r#"{"water_ml": 500, "sleep_start": "23:00"}"#,
            r#"{"water_ml": 500, "sleep_start": "25:00", "sleep_end": "07:00"}"#,
        ] {
            let response = send(&state, "PATCH", "/api/habits", Some(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
        assert_eq!(state.lock().habits().water_ml, 0);
    }

    #[tokio::test]
    async fn patch_habits_clears_sleep_with_other_fields() {
        let state = onboarded_state().await;
        send(
            &state,
            "PATCH",
            "/api/habits",
            Some(r#"{"sleep_start": "23:00", "sleep_end": "07:00"}"#),
        )
        .await;
        let response = send(
            &state,
            "PATCH",
            "/api/habits",
            Some(r#"{"steps": 4000, "clear_sleep": true}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let habits = body_json(response).await;
        assert_eq!(habits["steps"], 4000);
        assert!(habits.get("sleep_start").is_none());
    }

    #[test]
    fn entry_request_keeps_data_url_media_type() {
        let req = CreateEntryRequest {
            text: None,
            image_base64: Some("data:image/png;base64,QUJD".to_string()),
            caption: Some("lunch".to_string()),
        };
        let Ok(request) = analysis_request(req) else {
            panic!("valid image payload was rejected");
        };
        assert_eq!(request.image_base64.as_deref(), Some("QUJD"));
        assert_eq!(request.mime_type(), "image/png");
    }

    #[tokio::test]
    async fn water_quick_add() {
        let state = onboarded_state().await;
        send(&state, "POST", "/api/habits/water", None).await;
        let habits = body_json(send(&state, "POST", "/api/habits/water", None).await).await;
        assert_eq!(habits["water_ml"], 500);
    }

    #[tokio::test]
    async fn custom_habit_flow() {
        let state = onboarded_state().await;
        let response = send(&state, "POST", "/api/habits/custom", Some(r#"{"name": "  "}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&state, "POST", "/api/habits/custom", Some(r#"{"name": "Meditate"}"#)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let habit = body_json(response).await;
        let id = habit["id"].as_str().unwrap().to_string();

        let toggled = body_json(
            send(&state, "POST", &format!("/api/habits/custom/{id}/toggle"), None).await,
        )
        .await;
        assert_eq!(toggled["completed"], true);

        let response = send(&state, "POST", "/api/habits/custom/nope/toggle", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let uri = format!("/api/habits/custom/{id}");
        assert_eq!(send(&state, "DELETE", &uri, None).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(send(&state, "DELETE", &uri, None).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn finish_without_profile_returns_409() {
        let state = test_state(None);
        let response = send(&state, "POST", "/api/finish", None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(state.lock().history().is_empty());
    }

    #[tokio::test]
    async fn finish_archives_and_resets() {
        let state = onboarded_state().await;
        send(&state, "POST", "/api/entries", Some(r#"{"text": "chicken"}"#)).await;
        send(&state, "PATCH", "/api/habits", Some(r#"{"water_ml": 3000}"#)).await;

        let response = send(&state, "POST", "/api/finish?date=2024-06-02", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let log = body_json(response).await;
        assert_eq!(log["date"], "2024-06-02");
        // fat, calories, carbs and water are met: 4 of 8
        assert_eq!(log["score"], 50);
        assert_eq!(log["status"], "bad");

        let json = body_json(send(&state, "GET", "/api/state", None).await).await;
        assert_eq!(json["compliance"]["score"], 0);
        assert!(json["entries"].as_array().unwrap().is_empty());

        let history = body_json(send(&state, "GET", "/api/history", None).await).await;
        assert_eq!(history.as_array().unwrap().len(), 1);

        let day = send(&state, "GET", "/api/history/2024-06-02", None).await;
        assert_eq!(day.status(), StatusCode::OK);
        let missing = send(&state, "GET", "/api/history/2024-06-03", None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let invalid = send(&state, "GET", "/api/history/june", None).await;
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn calendar_and_dashboard() {
        let state = test_state(None);
        let response = send(&state, "GET", "/api/calendar", None).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let state = onboarded_state().await;
        send(&state, "POST", "/api/finish?date=2024-06-01", None).await;

        let days = body_json(send(&state, "GET", "/api/calendar?today=2024-06-03", None).await).await;
        let days = days.as_array().unwrap();
        assert_eq!(days.len(), 61);
        assert_eq!(days[0]["status"], "bad");
        assert_eq!(days[1]["status"], "missed");
        assert_eq!(days[2]["status"], "today");
        assert_eq!(days[3]["status"], "future");

        let dash = body_json(send(&state, "GET", "/api/dashboard?today=2024-07-01", None).await).await;
        assert_eq!(dash["progress"]["days_passed"], 30);
        assert_eq!(dash["advice"]["level"], "ok");
    }
}
