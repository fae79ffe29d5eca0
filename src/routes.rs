use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::AppError;
use crate::i18n::{Language, MetricsReport};
use crate::middleware::translate_responses;
use crate::security::verify_admin_key;
use crate::state::AppState;
use crate::translation::WarmupStatus;

pub fn router(state: AppState) -> Router {
    let api = state.config.api_prefix.clone();

    Router::new()
        .route("/health", get(health_handler))
        .route(&format!("{}/content", api), get(list_collections_handler))
        .route(
            &format!("{}/content/:collection", api),
            get(collection_handler),
        )
        .route("/admin/translations/clear", post(clear_cache_handler))
        .route(
            "/admin/translations/warm",
            post(start_warmup_handler).get(warmup_status_handler),
        )
        .route("/admin/translations/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(
            state.translation.clone(),
            translate_responses,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_collections_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let collections = state.content.list().await?;
    Ok(Json(json!({ "collections": collections })))
}

async fn collection_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(state.content.load(&collection).await?))
}

async fn clear_cache_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    verify_admin_key(&headers, state.config.admin_api_key.as_deref())?;

    let deleted = state.engine.clear_cache().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn start_warmup_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    verify_admin_key(&headers, state.config.admin_api_key.as_deref())?;

    if state.warmer.status().running {
        return Err(AppError::WarmupRunning);
    }

    let documents = state.content.all_documents().await?;
    let status = state.warmer.spawn(
        state.walker.clone(),
        documents,
        Language::all_enabled(),
        state.config.source_language,
    )?;
    info!("Started cache warm-up of {} translations", status.total);

    Ok((StatusCode::ACCEPTED, Json(status)))
}

async fn warmup_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WarmupStatus>, AppError> {
    verify_admin_key(&headers, state.config.admin_api_key.as_deref())?;
    Ok(Json(state.warmer.status()))
}

#[derive(serde::Serialize)]
struct MetricsResponse {
    #[serde(flatten)]
    report: MetricsReport,
    cache_degraded: bool,
}

async fn metrics_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, AppError> {
    verify_admin_key(&headers, state.config.admin_api_key.as_deref())?;
    Ok(Json(MetricsResponse {
        report: state.engine.metrics().report(),
        cache_degraded: state.engine.is_cache_degraded(),
    }))
}
