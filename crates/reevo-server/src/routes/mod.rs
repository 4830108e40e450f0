pub mod chat;
pub mod docs;
pub mod health;
pub mod proxy;

use axum::Router;

use crate::state::AppState;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(chat::routes(state.clone()))
        .merge(proxy::routes(state))
        .merge(docs::routes())
        .merge(health::routes())
}
