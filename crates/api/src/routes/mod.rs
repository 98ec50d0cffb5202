pub mod generate;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /generate        POST  multi-perspective batch generation
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(generate::router())
}
