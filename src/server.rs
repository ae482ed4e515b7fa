//! HTTP routes for page lookup and title-block save / clear.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use crate::contract::{ClearRequest, ClearResponse, ErrorResponse, SaveRequest, SaveResponse};
use crate::error::{StoreError, ValidationError};
use crate::record::PageRecord;
use crate::store::PageStore;

/// Server configuration loaded from environment variables.
///
/// | Env Var     | Default   |
/// |-------------|-----------|
/// | `HOST`      | `0.0.0.0` |
/// | `PORT`      | `3000`    |
/// | `PAGES_DIR` | `pages`   |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub pages_dir: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, std::num::ParseIntError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into()).parse()?;
        let pages_dir = std::env::var("PAGES_DIR").unwrap_or_else(|_| "pages".into());
        Ok(Self { host, port, pages_dir })
    }
}

/// Shared state for all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PageStore>,
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::Store(StoreError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Worker(_) => {
                tracing::error!(error = %self, "page store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse {
            ok: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn on_store<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn PageStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    Ok(tokio::task::spawn_blocking(move || op(store.as_ref())).await??)
}

fn parse_body(body: &Bytes) -> Result<Value, ValidationError> {
    serde_json::from_slice(body).map_err(|e| ValidationError::Malformed(e.to_string()))
}

// ── Handlers ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_page(State(state): State<AppState>, Path(page_id): Path<String>) -> ApiResult<PageRecord> {
    let record = on_store(&state, move |store| store.get(&page_id)).await?;
    Ok(Json(record))
}

async fn save_titleblock(State(state): State<AppState>, body: Bytes) -> ApiResult<SaveResponse> {
    let save = SaveRequest::from_value(parse_body(&body)?)?.validate()?;
    let record = on_store(&state, move |store| store.save_tagging(&save)).await?;
    Ok(Json(SaveResponse {
        ok: true,
        fingerprint: record.fingerprint.unwrap_or(Value::Null),
    }))
}

async fn clear_titleblock(State(state): State<AppState>, body: Bytes) -> ApiResult<ClearResponse> {
    let request = ClearRequest::from_value(parse_body(&body)?)?;
    request.validate()?;
    on_store(&state, move |store| store.clear_tagging(&request.page_id)).await?;
    Ok(Json(ClearResponse { ok: true }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/pages/{page_id}", get(get_page))
        .route("/api/titleblock", post(save_titleblock).delete(clear_titleblock))
        .with_state(state)
}
