//! Fallback HTTP routes for requests that are not WebSocket upgrades.

pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the router that serves non-upgrade requests.
pub fn build_router() -> Router<AppState> {
    Router::new().merge(handlers::system::routes())
}
