//! API Routes
//!
//! Configures the Axum router with the entity and service endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    create_handler, delete_handler, get_handler, health_handler, list_handler, stats_handler,
    update_handler, AppState,
};
use crate::models::{Entity, Student, Teacher};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET|POST /api/student`, `GET|PATCH|DELETE /api/student/:id`
/// - `GET|POST /api/teacher`, `GET|PATCH|DELETE /api/teacher/:id`
/// - `GET /stats` - Query cache statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api/student", entity_routes::<Student>())
        .nest("/api/teacher", entity_routes::<Teacher>())
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CRUD routes for one entity collection.
fn entity_routes<E: Entity>() -> Router<AppState> {
    Router::new()
        .route("/", get(list_handler::<E>).post(create_handler::<E>))
        .route(
            "/:id",
            get(get_handler::<E>)
                .patch(update_handler::<E>)
                .delete(delete_handler::<E>),
        )
}
