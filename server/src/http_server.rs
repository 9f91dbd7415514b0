use crate::auth::{self, TokenIssuer};
use crate::coordinator::{self, TranscriptFormat, TurnError};
use crate::storage::{
    DiscussionStoreRef, InMemoryStore, PlanStoreRef, StoreError, UserRecord, UserStoreRef,
};
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use consult_analysis::AnalysisPipeline;
use consult_core::ServerConfig;
use consult_protocol::{
    AnalysisRequest, AnalysisResponse, Credentials, CurrentUser, DownloadParams, ErrorResponse,
    HealthResponse, LoginResponse, MessageResponse, Plan, PlanCreate, PlanUpdate, SignupResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<AnalysisPipeline>,
    discussions: DiscussionStoreRef,
    users: UserStoreRef,
    plans: PlanStoreRef,
    tokens: Arc<TokenIssuer>,
    turn_timeout: Duration,
}

impl AppState {
    pub fn new(
        pipeline: Arc<AnalysisPipeline>,
        discussions: DiscussionStoreRef,
        users: UserStoreRef,
        plans: PlanStoreRef,
        tokens: TokenIssuer,
        turn_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            discussions,
            users,
            plans,
            tokens: Arc::new(tokens),
            turn_timeout,
        }
    }

    /// State backed by a single process-local store
    pub fn in_memory(pipeline: AnalysisPipeline, tokens: TokenIssuer, turn_timeout: Duration) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::new(
            Arc::new(pipeline),
            store.clone(),
            store.clone(),
            store,
            tokens,
            turn_timeout,
        )
    }
}

/// Error type for HTTP server, rendered as `{"detail": ...}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    Timeout(String),
    InternalError(String),
}

impl ApiError {
    fn status_and_detail(self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            Self::Unauthorized(d) => (StatusCode::UNAUTHORIZED, d),
            Self::NotFound(d) => (StatusCode::NOT_FOUND, d),
            Self::Conflict(d) => (StatusCode::CONFLICT, d),
            Self::Unprocessable(d) => (StatusCode::UNPROCESSABLE_ENTITY, d),
            Self::Timeout(d) => (StatusCode::GATEWAY_TIMEOUT, d),
            Self::InternalError(d) => (StatusCode::INTERNAL_SERVER_ERROR, d),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            error!(status = %status, detail = %detail, "Request failed");
        }
        (status, Json(ErrorResponse { detail })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(format!("Not found: {}", what)),
            StoreError::Conflict(what) => Self::Conflict(format!("Already exists: {}", what)),
            StoreError::StorageError(msg) => Self::InternalError(format!("Storage error: {}", msg)),
        }
    }
}

/// Provider and storage error text stays in the logs; it can carry upstream
/// URLs and response bodies.
impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::Timeout(_) => Self::Timeout(e.to_string()),
            TurnError::Pipeline(e) => {
                error!(error = %e, "Analysis pipeline failed");
                Self::InternalError(
                    "Analysis failed: the model could not generate a reply".to_string(),
                )
            }
            TurnError::Store(e) => {
                error!(error = %e, "Failed to store analysis turn");
                Self::InternalError("Analysis failed: the discussion could not be stored".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Unprocessable(rejection.body_text())
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins));

    Router::new()
        .route("/", get(health))
        .route("/analyze", post(analyze))
        .route("/analyze/", post(analyze))
        .route("/download", get(download))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(current_user))
        .route("/plans", get(list_plans).post(create_plan))
        .route("/plans/", get(list_plans).post(create_plan))
        .route(
            "/plans/:plan_id",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        .layer(middleware)
        .with_state(state)
}

/// Start the HTTP server and serve until Ctrl-C
pub async fn run_server(state: AppState, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.http_addr;
    let app = build_router(state, &config.allowed_origins);

    info!("Starting HTTP server on {}", addr);
    axum::Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind HTTP server to {}", addr))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated with an error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping HTTP server");
}

/// Health check handler
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "active".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let Json(payload) = payload?;
    let response = coordinator::process_turn(
        &state.pipeline,
        state.discussions.as_ref(),
        state.turn_timeout,
        payload,
    )
    .await?;
    Ok(Json(response))
}

/// Transcript of the requested discussion, or of the most recent one
async fn download(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let format = TranscriptFormat::parse(&params.format).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Unsupported format '{}', expected txt or md",
            params.format
        ))
    })?;

    let report_not_found = || ApiError::NotFound("Report not found".to_string());
    let record = match params.id.as_deref() {
        Some(id) => match state.discussions.get(id).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Err(report_not_found()),
            Err(e) => return Err(e.into()),
        },
        None => state.discussions.latest().await?.ok_or_else(report_not_found)?,
    };

    let body = coordinator::render_transcript(&record, format);
    let disposition = format!(
        "attachment; filename=\"analysis_report.{}\"",
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn signup(
    State(state): State<AppState>,
    credentials: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<SignupResponse>, ApiError> {
    let Json(credentials) = credentials?;
    let email = auth::normalize_email(&credentials.email);
    if !auth::is_valid_email(&email) {
        return Err(ApiError::Unprocessable("Invalid email address".to_string()));
    }
    if credentials.password.is_empty() {
        return Err(ApiError::Unprocessable("Password must not be empty".to_string()));
    }

    let password = credentials.password;
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| ApiError::InternalError(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let user_id = match state
        .users
        .insert_user(UserRecord::new(&email, password_hash))
        .await
    {
        Ok(id) => id,
        Err(StoreError::Conflict(_)) => {
            return Err(ApiError::Conflict("User already exists".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user_id, "User registered");
    Ok(Json(SignupResponse {
        message: "User created successfully".to_string(),
        user_id,
    }))
}

async fn login(
    State(state): State<AppState>,
    credentials: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(credentials) = credentials?;
    let user = state
        .users
        .find_by_email(&auth::normalize_email(&credentials.email))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let password = credentials.password;
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::InternalError(format!("Password check task failed: {}", e)))?
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    if !matches {
        return Err(ApiError::BadRequest("Incorrect password".to_string()));
    }

    let token = state
        .tokens
        .issue(&user.id, &user.email)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user_id: user.id,
        token,
    }))
}

async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CurrentUser>, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state
        .tokens
        .verify(token.trim())
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    Ok(Json(CurrentUser {
        user_id: claims.sub,
        email: claims.email,
    }))
}

fn check_plan_id(plan_id: &str) -> Result<(), ApiError> {
    Uuid::parse_str(plan_id)
        .map(|_| ())
        .map_err(|_| ApiError::BadRequest("Invalid plan ID format".to_string()))
}

fn plan_not_found(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(_) => ApiError::NotFound("Plan not found".to_string()),
        other => other.into(),
    }
}

async fn create_plan(
    State(state): State<AppState>,
    plan: Result<Json<PlanCreate>, JsonRejection>,
) -> Result<Json<Plan>, ApiError> {
    let Json(plan) = plan?;
    Ok(Json(state.plans.create_plan(plan).await?))
}

async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<Plan>>, ApiError> {
    Ok(Json(state.plans.list_plans().await?))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    check_plan_id(&plan_id)?;
    let plan = state.plans.get_plan(&plan_id).await.map_err(plan_not_found)?;
    Ok(Json(plan))
}

async fn update_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
    update: Result<Json<PlanUpdate>, JsonRejection>,
) -> Result<Json<Plan>, ApiError> {
    let Json(update) = update?;
    check_plan_id(&plan_id)?;
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let plan = state
        .plans
        .update_plan(&plan_id, update)
        .await
        .map_err(plan_not_found)?;
    Ok(Json(plan))
}

async fn delete_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    check_plan_id(&plan_id)?;
    state
        .plans
        .delete_plan(&plan_id)
        .await
        .map_err(plan_not_found)?;
    Ok(Json(MessageResponse {
        message: "Plan deleted successfully".to_string(),
    }))
}
