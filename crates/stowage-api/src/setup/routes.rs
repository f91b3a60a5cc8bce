//! Route configuration and setup

use crate::handlers;
use crate::middleware::{pre_upload_validate, request_id_middleware, upload_files};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const API_PREFIX: &str = "/api/v0";

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router<()> {
    let uploads = Router::new()
        .route("/uploads", post(handlers::receive_uploads))
        .route_layer(axum::middleware::from_fn_with_state(
            state.upload.clone(),
            upload_files,
        ));

    let manifests = Router::new()
        .route("/uploads/validate", post(handlers::manifest_accepted))
        .route_layer(axum::middleware::from_fn_with_state(
            state.pre_upload.clone(),
            pre_upload_validate,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest(API_PREFIX, uploads.merge(manifests))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
