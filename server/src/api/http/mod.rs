//! HTTP API handlers

mod agent;
mod health;
mod reconcile;
mod workspace;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Agent routes
        .route("/agents", post(agent::register_agent))
        .route("/agents", get(agent::list_agents))
        // Workspace routes
        .route("/workspaces", post(workspace::create_workspace))
        .route("/workspaces", get(workspace::list_workspaces))
        .route("/workspaces/{id}", get(workspace::get_workspace))
        .route(
            "/workspaces/{id}/desired_state",
            put(workspace::update_desired_state),
        )
        // Agent reconcile protocol
        .route("/internal/reconcile", post(reconcile::reconcile));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
