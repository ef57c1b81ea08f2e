//! Likes, comments, follows, clip deletion and user registration.

use std::{borrow::Cow, sync::Arc};

use chrono::Utc;

use crate::{
    errors::{ServiceError, ServiceResult, StoreError},
    filter::ContentFilter,
    id::new_comment_id,
    identity::IdentityResolver,
    store::DocumentStore,
    types::{Comment, Like, LikeOutcome, NewUser, UserProfile},
    validators,
};

const AVATAR_BASE_URL: &str = "https://api.dicebear.com/5.x/bottts-neutral/svg";
const AVATAR_BACKGROUNDS: &str = "7d7d7d,d74d4d,7e22ce,60a5fa,22d3ee";

/// Generated avatar for a freshly registered username.
pub fn avatar_url(username: &str) -> String {
    format!("{AVATAR_BASE_URL}?seed={username}&backgroundColor={AVATAR_BACKGROUNDS}")
}

fn missing_clip_id(clip_id: &str) -> ServiceResult<()> {
    if clip_id.trim().is_empty() {
        return Err(ServiceError::BadRequest(Cow::Borrowed("Missing clip ID.")));
    }
    Ok(())
}

fn clip_not_found(err: StoreError) -> ServiceError {
    match err {
        StoreError::NotFound { .. } => ServiceError::NotFound(Cow::Borrowed("Clip not found.")),
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct EngagementService {
    store: Arc<dyn DocumentStore>,
    identities: IdentityResolver,
    filter: Arc<dyn ContentFilter>,
}

impl EngagementService {
    pub fn new(store: Arc<dyn DocumentStore>, filter: Arc<dyn ContentFilter>) -> Self {
        Self {
            identities: IdentityResolver::new(store.clone()),
            store,
            filter,
        }
    }

    pub fn identities(&self) -> &IdentityResolver {
        &self.identities
    }

    /// Likes the clip if the caller has not liked it yet, otherwise removes the like.
    pub async fn toggle_like(&self, clip_id: &str, principal: &str) -> ServiceResult<LikeOutcome> {
        missing_clip_id(clip_id)?;
        let identity = self.identities.require(principal).await?;
        let like = Like {
            date: Utc::now(),
            uid: identity.uid,
        };
        let outcome = self
            .store
            .toggle_like(clip_id, &identity.username, &like)
            .await
            .map_err(clip_not_found)?;
        log::debug!(
            "{} {} clip {clip_id} ({} likes)",
            identity.username,
            if outcome.liked { "liked" } else { "unliked" },
            outcome.likes
        );
        Ok(outcome)
    }

    /// Stores a filtered comment and returns exactly what was persisted.
    pub async fn add_comment(&self, clip_id: &str, principal: &str, raw_text: &str) -> ServiceResult<Comment> {
        missing_clip_id(clip_id)?;
        if raw_text.trim().is_empty() {
            return Err(ServiceError::BadRequest(Cow::Borrowed("Missing comment.")));
        }
        let identity = self.identities.require(principal).await?;
        let text = validators::validate_comment(raw_text)?;
        let comment = Comment {
            id: new_comment_id(),
            comment: self.filter.clean(&text),
            date: Utc::now(),
            uid: identity.uid,
            username: identity.username,
            avatar: identity.avatar,
        };
        self.store
            .append_comment(clip_id, &comment)
            .await
            .map_err(clip_not_found)
    }

    /// Adds `target` to the caller's follow set. Following twice is a no-op.
    pub async fn follow(&self, principal: &str, target: &str) -> ServiceResult<()> {
        let (current, target) = self.follow_pair(principal, target).await?;
        self.store.follow(&current, &target).await.map_err(|err| match err {
            StoreError::NotFound { .. } => ServiceError::NotFound(Cow::Borrowed("User not found.")),
            other => other.into(),
        })
    }

    /// Removes `target` from the caller's follow set. Unfollowing twice is a no-op.
    pub async fn unfollow(&self, principal: &str, target: &str) -> ServiceResult<()> {
        let (current, target) = self.follow_pair(principal, target).await?;
        self.store.unfollow(&current, &target).await.map_err(ServiceError::from)
    }

    async fn follow_pair(&self, principal: &str, target: &str) -> ServiceResult<(String, String)> {
        let target = target.trim().to_lowercase();
        if target.is_empty() {
            return Err(ServiceError::BadRequest(Cow::Borrowed("Missing username.")));
        }
        let identity = self.identities.require(principal).await?;
        let current = identity.username.to_lowercase();
        if current == target {
            return Err(ServiceError::BadRequest(Cow::Borrowed("You cannot follow yourself.")));
        }
        Ok((current, target))
    }

    /// Deletes a clip owned by the caller together with its likes and comments.
    pub async fn delete_clip(&self, clip_id: &str, principal: &str) -> ServiceResult<()> {
        missing_clip_id(clip_id)?;
        let identity = self.identities.require(principal).await?;
        let report = self
            .store
            .delete_clip(clip_id, &identity.username)
            .await
            .map_err(clip_not_found)?;
        log::info!(
            "{} deleted clip {clip_id} ({} likes, {} comments removed)",
            identity.username,
            report.likes_removed,
            report.comments_removed
        );
        Ok(())
    }

    /// Claims `username` for the caller's principal.
    pub async fn register(&self, principal: &str, username: &str) -> ServiceResult<UserProfile> {
        if principal.is_empty() {
            return Err(ServiceError::Unauthorized);
        }
        let username = validators::normalize_username(username)?;
        let user = NewUser {
            photo_url: avatar_url(&username),
            username,
            uid: principal.to_string(),
            created_at: Utc::now(),
        };
        let profile = self.store.register_user(&user).await?;
        log::info!("registered user {}", profile.username);
        Ok(profile)
    }
}
