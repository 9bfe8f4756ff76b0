pub mod admin;
pub mod cohorts;
pub mod scores;
pub mod session;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/scores", scores::router(state.clone()))
        .nest("/cohorts", cohorts::router(state.clone()))
        .nest("/admin", admin::router(state))
}
