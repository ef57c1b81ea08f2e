//! HTTP surface: authentication, per-IP rate limits, CORS, request deadline
//! and the JSON routes over the engagement, feed, upload and catalog services.

pub mod auth;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod routes;
pub mod state;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

pub use self::auth::{Authenticator, IssueError, JwtAuthenticator, Principal};
pub use self::error::ApiError;
pub use self::state::{AppState, Collaborators, StartupError};

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/like", post(routes::toggle_like))
        .route("/api/comment", post(routes::add_comment))
        .route("/api/deleteClip", post(routes::delete_clip))
        .route("/api/follow", post(routes::follow))
        .route("/api/unfollow", post(routes::unfollow))
        .route("/api/register", post(routes::register))
        .route("/api/getUploadAuth", post(routes::upload_auth))
        .route("/api/clips/recent", get(routes::recent_clips))
        .route("/api/clips/top", get(routes::top_clips))
        .route("/api/clips/following", get(routes::following_clips))
        .route("/api/clips/:id", get(routes::clip_detail))
        .route("/api/users/:username", get(routes::user_profile))
        .route("/api/users/:username/clips", get(routes::user_clips))
        .route("/api/stats", get(routes::stats))
        .route_layer(from_fn_with_state(state.clone(), auth::require_principal));

    let public = Router::new()
        .route("/health", get(routes::health))
        .route("/api/mux-webhook", post(routes::video_webhook))
        .route("/api/games", get(routes::games));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), rate_limit::enforce))
        .layer(from_fn_with_state(state.clone(), middleware::request_timeout))
        .layer(from_fn(middleware::access_log))
        .layer(middleware::cors_layer(&state.config.cors_origins()))
        .with_state(state)
}
