pub mod ads;
pub mod auth;
pub mod error;
pub mod extract;
pub mod forms;
pub mod middleware;
pub mod proposals;

use std::sync::Arc;

use axum::{
    Json, Router, middleware as axum_middleware,
    routing::{get, post},
};
use tracing::error;

use barter_db::Database;
use barter_types::api::HealthResponse;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Build the full HTTP surface. Layers such as CORS and tracing are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(ads::list_ads))
        .route("/health", get(health))
        .route("/signup/", post(auth::signup))
        .route("/login/", post(auth::login))
        .route("/ads/{ad_id}/", get(ads::ad_detail));

    let protected_routes = Router::new()
        .route("/ads/create/", get(ads::create_form).post(ads::create_ad))
        .route("/ads/{ad_id}/edit/", get(ads::edit_form).post(ads::edit_ad))
        .route("/ads/{ad_id}/delete/", get(ads::delete_confirm).post(ads::delete_ad))
        .route("/proposals/", get(proposals::list_proposals))
        .route(
            "/proposals/create/",
            get(proposals::create_form).post(proposals::create_proposal),
        )
        .route("/proposals/{proposal_id}/update/", post(proposals::update_status))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Run blocking database work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
