//! REST API for the NERDm record editor
//!
//! Exposes the editable record service over HTTP: read, patch, and discard
//! changes to a staged record, plus health and statistics endpoints.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection},
        DefaultBodyLimit, FromRequestParts, OriginalUri, Path, State,
    },
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ned_core::{Ediid, NerdRecord, Principal};
use ned_editor::{AccessGuard, EditorConfig, EditorError, EditorService, EditorStats, ServiceStats};
use ned_source::SourceFetcher;
use ned_storage::{RecordStore, StoreStats};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Base path the record endpoints are mounted under unless configured otherwise
pub const DEFAULT_BASE_PATH: &str = "/pdr/lp/editor";

/// Largest request body accepted unless configured otherwise (16 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Editor service with runtime-selected store and source
pub type DynEditorService = EditorService<Arc<dyn RecordStore>, Arc<dyn SourceFetcher>>;

/// API State holding the editor service
#[derive(Clone)]
pub struct ApiState {
    editor: Arc<DynEditorService>,
}

impl ApiState {
    /// Create API state from its parts
    pub fn new(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn SourceFetcher>,
        guard: Arc<dyn AccessGuard>,
        config: EditorConfig,
    ) -> Self {
        Self::from_editor(Arc::new(EditorService::new(store, source, guard, config)))
    }

    /// Wrap an already constructed service
    pub fn from_editor(editor: Arc<DynEditorService>) -> Self {
        Self { editor }
    }

    pub fn editor(&self) -> &DynEditorService {
        &self.editor
    }
}

/// Router configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Path prefix for the record endpoints, e.g. `/pdr/lp/editor`
    pub base_path: String,

    /// Request bodies above this size are answered with 413
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ApiConfig {
    /// Set the base path; a missing leading slash is added and trailing ones dropped
    pub fn with_base_path(mut self, base_path: impl AsRef<str>) -> Self {
        let trimmed = base_path.as_ref().trim().trim_matches('/');
        self.base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

/// Create the main API router
pub fn create_router(state: ApiState, config: &ApiConfig) -> Router {
    let records = Router::new()
        .route(
            "/{ediid}",
            get(get_record).patch(patch_record).delete(delete_record_changes),
        )
        .method_not_allowed_fallback(method_not_allowed);

    let router = Router::new()
        // Health check
        .route("/health", get(health_check))
        // System operations
        .route("/system/stats", get(get_stats));

    let router = if config.base_path.is_empty() {
        router.merge(records)
    } else {
        router.nest(&config.base_path, records)
    };

    router
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Extractors
// ============================================================================

/// Method and path of the request as the client sent it
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub path: String,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Nested routers see a stripped URI
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.path().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Ok(Self {
            method: parts.method.clone(),
            path,
        })
    }
}

/// The caller, taken from an `Authorization: Bearer` header
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = bearer_token(&parts.headers)
            .map(Principal::token)
            .unwrap_or(Principal::Anonymous);
        Ok(Self(principal))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Error body returned on every failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub path: String,
    pub http_status_code: u16,
    pub message: String,
    pub http_method: String,
}

#[derive(Debug, Serialize)]
pub struct StoreStatsResponse {
    pub total_entries: u64,
    pub edited_entries: u64,
}

impl From<StoreStats> for StoreStatsResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            total_entries: stats.total_entries,
            edited_entries: stats.edited_entries,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub editor: EditorStats,
    pub store: StoreStatsResponse,
}

// ============================================================================
// Error Handling
// ============================================================================

/// What went wrong: a service error, or a request the router could not serve
#[derive(Debug)]
enum Failure {
    Editor(EditorError),
    NoRoute,
    MethodNotAllowed,
    BodyTooLarge(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Editor(error) => write!(f, "{error}"),
            Self::NoRoute => f.write_str("no route"),
            Self::MethodNotAllowed => f.write_str("method not allowed"),
            Self::BodyTooLarge(detail) => write!(f, "body too large: {detail}"),
        }
    }
}

/// A failed request, rendered as an [`ErrorInfo`] body
#[derive(Debug)]
pub struct ApiError {
    failure: Failure,
    meta: RequestMeta,
}

impl ApiError {
    pub fn new(error: EditorError, meta: RequestMeta) -> Self {
        Self {
            failure: Failure::Editor(error),
            meta,
        }
    }

    fn from_path_rejection(rejection: PathRejection, meta: RequestMeta) -> Self {
        Self::new(EditorError::InvalidInput(rejection.body_text()), meta)
    }

    fn from_body_rejection(rejection: BytesRejection, meta: RequestMeta) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self {
                failure: Failure::BodyTooLarge(rejection.body_text()),
                meta,
            }
        } else {
            Self::new(EditorError::InvalidInput(rejection.body_text()), meta)
        }
    }

    /// HTTP status for the error kind
    pub fn status(&self) -> StatusCode {
        match &self.failure {
            Failure::Editor(EditorError::ResourceNotFound(_)) | Failure::NoRoute => StatusCode::NOT_FOUND,
            Failure::Editor(EditorError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Failure::Editor(EditorError::UnauthorizedUser { .. }) => StatusCode::UNAUTHORIZED,
            Failure::Editor(EditorError::BackendUnavailable(_)) => StatusCode::BAD_GATEWAY,
            Failure::Editor(EditorError::InternalFailure(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Failure::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Failure::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Fixed client-facing message; details stay in the log
    pub fn message(&self) -> &'static str {
        match &self.failure {
            Failure::Editor(EditorError::ResourceNotFound(_)) | Failure::NoRoute => "Resource Not Found",
            Failure::Editor(EditorError::InvalidInput(_)) => "Invalid input error",
            Failure::Editor(EditorError::UnauthorizedUser { .. }) => "Unauthorized user",
            Failure::Editor(EditorError::BackendUnavailable(_)) => "Can not connect to backend server",
            Failure::Editor(EditorError::InternalFailure(_)) => "Internal Server Error",
            Failure::MethodNotAllowed => "Method Not Allowed",
            Failure::BodyTooLarge(_) => "Request body too large",
        }
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            path: self.meta.path.clone(),
            http_status_code: self.status().as_u16(),
            message: self.message().to_string(),
            http_method: self.meta.method.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(method = %self.meta.method, path = %self.meta.path, error = %self.failure, "request failed");
        } else {
            warn!(method = %self.meta.method, path = %self.meta.path, error = %self.failure, "request rejected");
        }

        (status, Json(self.info())).into_response()
    }
}

/// Attach request details to service errors
trait WithMeta<T> {
    fn with_meta(self, meta: &RequestMeta) -> Result<T, ApiError>;
}

impl<T> WithMeta<T> for Result<T, EditorError> {
    fn with_meta(self, meta: &RequestMeta) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::new(e, meta.clone()))
    }
}

fn parse_ediid(
    path: Result<Path<String>, PathRejection>,
    meta: &RequestMeta,
) -> Result<Ediid, ApiError> {
    let Path(raw) = path.map_err(|rejection| ApiError::from_path_rejection(rejection, meta.clone()))?;
    Ediid::new(raw)
        .map_err(|e| ApiError::new(EditorError::ResourceNotFound(e.to_string()), meta.clone()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "NERDm Record Editor"
    }))
}

/// Get the editable copy of a record
async fn get_record(
    State(state): State<ApiState>,
    meta: RequestMeta,
    Caller(principal): Caller,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<NerdRecord>, ApiError> {
    let ediid = parse_ediid(path, &meta)?;
    let record = state.editor.get_record(&principal, &ediid).await.with_meta(&meta)?;
    Ok(Json(record))
}

/// Merge the request body into the staged record
async fn patch_record(
    State(state): State<ApiState>,
    meta: RequestMeta,
    Caller(principal): Caller,
    path: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<NerdRecord>, ApiError> {
    let ediid = parse_ediid(path, &meta)?;
    let body = body.map_err(|rejection| ApiError::from_body_rejection(rejection, meta.clone()))?;
    let record = state
        .editor
        .patch_record(&principal, &ediid, &body)
        .await
        .with_meta(&meta)?;
    Ok(Json(record))
}

/// Discard all changes and return the pristine record
async fn delete_record_changes(
    State(state): State<ApiState>,
    meta: RequestMeta,
    Caller(principal): Caller,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<NerdRecord>, ApiError> {
    let ediid = parse_ediid(path, &meta)?;
    let record = state
        .editor
        .delete_record_changes(&principal, &ediid)
        .await
        .with_meta(&meta)?;
    Ok(Json(record))
}

/// Get system statistics; the access guard decides who may see them
async fn get_stats(
    State(state): State<ApiState>,
    meta: RequestMeta,
    Caller(principal): Caller,
) -> Result<Json<StatsResponse>, ApiError> {
    let ServiceStats { editor, store } = state.editor.service_stats(&principal).await.with_meta(&meta)?;
    Ok(Json(StatsResponse {
        editor,
        store: store.into(),
    }))
}

/// Fallback for paths no route matches
async fn not_found(meta: RequestMeta) -> ApiError {
    ApiError {
        failure: Failure::NoRoute,
        meta,
    }
}

/// Fallback for a known path called with an unsupported method
async fn method_not_allowed(meta: RequestMeta) -> ApiError {
    ApiError {
        failure: Failure::MethodNotAllowed,
        meta,
    }
}
