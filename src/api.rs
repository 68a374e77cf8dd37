// Trasparenza Comuni - REST API
// Banner, liveness, and read-only access to the collected datasets

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::persist::{dataset_path, is_valid_dataset_name, list_datasets, load};

/// Shared application state
#[derive(Clone)]
pub struct ApiState {
    data_dir: Arc<PathBuf>,
}

impl ApiState {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        ApiState {
            data_dir: Arc::new(data_dir.into()),
        }
    }
}

#[derive(Serialize)]
struct Banner {
    message: &'static str,
    version: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - Service banner
async fn root() -> impl IntoResponse {
    Json(Banner {
        message: "Benvenuto in Trasparenza Comuni API",
        version: crate::VERSION,
        status: "active",
    })
}

/// GET /health - Liveness
async fn health_check() -> impl IntoResponse {
    Json(Health { status: "healthy" })
}

/// GET /api/datasets - Names of the persisted datasets
async fn get_datasets(State(state): State<ApiState>) -> Response {
    match list_datasets(&state.data_dir) {
        Ok(names) => (StatusCode::OK, Json(names)).into_response(),
        Err(e) => {
            tracing::error!("Error listing datasets: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to list datasets")
        }
    }
}

/// GET /api/datasets/:name - Contents of one dataset
async fn get_dataset(State(state): State<ApiState>, Path(name): Path<String>) -> Response {
    let decoded = urlencoding::decode(&name)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| name.clone());

    if !is_valid_dataset_name(&decoded) {
        return error_response(StatusCode::BAD_REQUEST, format!("invalid dataset name: {}", decoded));
    }

    let path = dataset_path(&state.data_dir, &decoded);
    if !path.exists() {
        return error_response(StatusCode::NOT_FOUND, format!("dataset not found: {}", decoded));
    }

    match load::<serde_json::Value>(&path) {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => {
            tracing::error!("Error reading dataset {}: {:#}", decoded, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read dataset")
        }
    }
}

/// Full application router
pub fn router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/datasets", get(get_datasets))
        .route("/datasets/:name", get(get_dataset))
        .with_state(state);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}
