mod hcps;
mod interactions;

pub mod health;
pub mod metrics;

use axum::{
    Router,
    routing::{get, post},
};
use deadpool_postgres::Pool;

/// Build the /api/v1 routes
pub fn api_routes() -> Router<Pool> {
    Router::new()
        .route("/hcps", post(hcps::create).get(hcps::list))
        .route("/hcps/{id}", get(hcps::read))
        .route(
            "/interactions",
            post(interactions::create).get(interactions::list),
        )
        .route("/interactions/chat", post(interactions::chat))
        .route("/interactions/agent", post(interactions::agent_chat))
        .route(
            "/interactions/{id}",
            get(interactions::read).put(interactions::update),
        )
}
