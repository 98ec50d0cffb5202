use axum::routing::post;
use axum::Router;

use crate::handlers::generate;
use crate::state::AppState;

/// Routes mounted at `/api`.
///
/// ```text
/// POST   /generate        -> generate
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate::generate))
}
