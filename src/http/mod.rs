use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod middleware;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::posts())
        .merge(routes::feed())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::faults::report_faults,
        ))
        .with_state(state)
}
