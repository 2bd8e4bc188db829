use axum::{Router, http::Uri};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    error::HttpError,
    handler::{auth::auth_handler, movie::movie_handler, users::users_handler},
};

pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .nest("/auth", auth_handler(app_state.clone()))
        .nest("/movies", movie_handler(app_state.clone()))
        .nest("/users", users_handler(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Unknown routes still answer with the JSON error envelope.
    Router::new().nest("/api", api_route).fallback(not_found)
}

async fn not_found(uri: Uri) -> HttpError {
    HttpError::not_found(format!("Route {} not found", uri.path()))
}
