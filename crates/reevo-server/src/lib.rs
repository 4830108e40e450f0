//! Local stand-in for the Reevo chat API: a mock `/chat` and an authenticated
//! proxy at `/api/v1/chat`.
pub mod configuration;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::configure(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
