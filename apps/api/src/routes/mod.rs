pub mod health;
pub mod page;

use axum::{
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers as evaluation;
use crate::session::handlers as session;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page::index_handler))
        .route("/health", get(health::health_handler))
        // Session API (sidebar)
        .route("/api/v1/sessions", post(session::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(session::handle_get_session)
                .patch(session::handle_update_session)
                .delete(session::handle_delete_session),
        )
        // Evaluation API
        .route(
            "/api/v1/sessions/:id/evaluations/multi",
            post(evaluation::handle_evaluate_multi),
        )
        .route(
            "/api/v1/sessions/:id/evaluations/single",
            post(evaluation::handle_evaluate_single),
        )
        .with_state(state)
}
