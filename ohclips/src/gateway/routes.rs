use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{auth::Principal, error::ApiError, state::AppState};
use crate::{
    catalog::GameCatalog,
    feed::clamp_max,
    types::{ClipDetail, Comment, EnrichedClip, LikeOutcome, PublicProfile, SiteCounts},
    uploads::{SIGNATURE_HEADER, UploadTicket, VideoEvent},
};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ClipRequest {
    #[serde(rename = "clipId", default)]
    pub clip_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(rename = "clipId", default)]
    pub clip_id: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub game: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub max: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

const SUCCESS: Success = Success { success: true };

#[derive(Debug, Serialize)]
pub struct CommentCreated {
    pub success: bool,
    #[serde(rename = "commentData")]
    pub comment_data: Comment,
}

#[derive(Debug, Serialize)]
pub struct Registered {
    pub success: bool,
    pub user: PublicProfile,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    body: Result<Json<ClipRequest>, JsonRejection>,
) -> ApiResult<LikeOutcome> {
    let Json(body) = body?;
    Ok(Json(state.engagement.toggle_like(&body.clip_id, &principal).await?))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    body: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult<CommentCreated> {
    let Json(body) = body?;
    let comment = state
        .engagement
        .add_comment(&body.clip_id, &principal, &body.comment)
        .await?;
    Ok(Json(CommentCreated {
        success: true,
        comment_data: comment,
    }))
}

pub async fn delete_clip(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    body: Result<Json<ClipRequest>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    state.engagement.delete_clip(&body.clip_id, &principal).await?;
    Ok(Json(SUCCESS))
}

pub async fn follow(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    body: Result<Json<UsernameRequest>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    state.engagement.follow(&principal, &body.username).await?;
    Ok(Json(SUCCESS))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    body: Result<Json<UsernameRequest>, JsonRejection>,
) -> ApiResult<Success> {
    let Json(body) = body?;
    state.engagement.unfollow(&principal, &body.username).await?;
    Ok(Json(SUCCESS))
}

pub async fn register(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    body: Result<Json<UsernameRequest>, JsonRejection>,
) -> ApiResult<Registered> {
    let Json(body) = body?;
    let profile = state.engagement.register(&principal, &body.username).await?;
    Ok(Json(Registered {
        success: true,
        user: profile.public_view(),
    }))
}

pub async fn upload_auth(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
    body: Result<Json<UploadRequest>, JsonRejection>,
) -> ApiResult<UploadTicket> {
    let Json(body) = body?;
    Ok(Json(
        state
            .uploads
            .authorize_upload(&principal, &body.title, &body.game)
            .await?,
    ))
}

pub async fn video_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    state.webhooks.verify(signature, &body, Utc::now())?;
    let event: VideoEvent = serde_json::from_slice(&body).map_err(|err| {
        log::debug!("rejected webhook body: {err}");
        ApiError::invalid_body()
    })?;
    state.uploads.ingest(event).await.map_err(|err| {
        log::error!("webhook ingestion failed: {err}");
        ApiError::internal()
    })?;
    Ok((StatusCode::OK, "Event received"))
}

pub async fn games(State(state): State<AppState>) -> ApiResult<GameCatalog> {
    Ok(Json(state.catalog.games().await?))
}

pub async fn recent_clips(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> ApiResult<Vec<EnrichedClip>> {
    Ok(Json(state.feeds.recent(clamp_max(params.max)).await?))
}

pub async fn top_clips(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> ApiResult<Vec<EnrichedClip>> {
    Ok(Json(state.feeds.top(clamp_max(params.max)).await?))
}

pub async fn following_clips(
    State(state): State<AppState>,
    Extension(Principal(principal)): Extension<Principal>,
) -> ApiResult<Vec<EnrichedClip>> {
    let identity = state.identities.require(&principal).await?;
    Ok(Json(state.feeds.following_of(&identity.username).await?))
}

pub async fn clip_detail(State(state): State<AppState>, Path(clip_id): Path<String>) -> ApiResult<ClipDetail> {
    Ok(Json(state.feeds.clip(&clip_id).await?))
}

pub async fn user_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<PublicProfile> {
    Ok(Json(state.feeds.profile(&username).await?))
}

pub async fn user_clips(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Vec<EnrichedClip>> {
    Ok(Json(state.feeds.by_author(&username).await?))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<SiteCounts> {
    Ok(Json(state.feeds.counts().await?))
}
