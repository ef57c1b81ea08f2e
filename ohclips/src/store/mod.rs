//! Document store adapters.
//!
//! Services talk to storage exclusively through [`DocumentStore`], so the
//! Redis backend used in production and the in-memory backend used by tests
//! and local development are interchangeable.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use std::{cmp::Ordering, time::Duration};

use async_trait::async_trait;

use crate::{
    errors::StoreError,
    types::{Clip, Comment, DeleteReport, Like, LikeOutcome, NewUser, UserProfile},
};

/// Which clips a feed query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipFilter {
    All,
    Author(String),
    /// Clips owned by any of these usernames. Callers never pass an empty list.
    Authors(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOrder {
    /// Newest first.
    Recent,
    /// Most liked first, ties broken by newest first, then by id.
    Top,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipQuery {
    pub filter: ClipFilter,
    pub order: ClipOrder,
    pub limit: Option<usize>,
}

impl ClipQuery {
    pub fn recent(limit: usize) -> Self {
        Self {
            filter: ClipFilter::All,
            order: ClipOrder::Recent,
            limit: Some(limit),
        }
    }

    pub fn top(limit: usize) -> Self {
        Self {
            filter: ClipFilter::All,
            order: ClipOrder::Top,
            limit: Some(limit),
        }
    }

    pub fn by_author(username: impl Into<String>) -> Self {
        Self {
            filter: ClipFilter::Author(username.into()),
            order: ClipOrder::Recent,
            limit: None,
        }
    }

    pub fn by_authors(usernames: Vec<String>) -> Self {
        Self {
            filter: ClipFilter::Authors(usernames),
            order: ClipOrder::Recent,
            limit: None,
        }
    }
}

/// Typed access to users, clips and their like and comment children.
///
/// Every mutating method is atomic with respect to concurrent callers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ── Users ──

    /// Claims `user.username` for `user.uid`. Fails with
    /// [`StoreError::UniqueConstraintViolation`] if either is already taken.
    async fn register_user(&self, user: &NewUser) -> Result<UserProfile, StoreError>;
    async fn user(&self, username: &str) -> Result<Option<UserProfile>, StoreError>;
    async fn username_for_principal(&self, uid: &str) -> Result<Option<String>, StoreError>;
    /// Adds `target` to the follow set of `username`; both must exist.
    async fn follow(&self, username: &str, target: &str) -> Result<(), StoreError>;
    async fn unfollow(&self, username: &str, target: &str) -> Result<(), StoreError>;
    async fn user_count(&self) -> Result<u64, StoreError>;

    // ── Clips ──

    async fn insert_clip(&self, clip: &Clip) -> Result<(), StoreError>;
    async fn clip(&self, clip_id: &str) -> Result<Option<Clip>, StoreError>;
    async fn clips(&self, query: &ClipQuery) -> Result<Vec<Clip>, StoreError>;
    async fn clip_count(&self) -> Result<u64, StoreError>;
    /// Removes the clip and all of its likes and comments. Fails with
    /// [`StoreError::NotOwner`] when `owner` is not the clip's username.
    async fn delete_clip(&self, clip_id: &str, owner: &str) -> Result<DeleteReport, StoreError>;

    // ── Likes ──

    /// Flips the like of `username` on the clip and keeps `Clip::likes` equal
    /// to the number of likes, as one atomic step.
    async fn toggle_like(&self, clip_id: &str, username: &str, like: &Like) -> Result<LikeOutcome, StoreError>;
    /// Usernames that liked each clip, in the order of `clip_ids`.
    async fn likes_for_many(&self, clip_ids: &[String]) -> Result<Vec<Vec<String>>, StoreError>;

    // ── Comments ──

    async fn append_comment(&self, clip_id: &str, comment: &Comment) -> Result<Comment, StoreError>;
    /// Comments of a clip, newest first.
    async fn comments(&self, clip_id: &str) -> Result<Vec<Comment>, StoreError>;

    // ── Key-value cache ──

    async fn cache_get(&self, name: &str) -> Result<Option<String>, StoreError>;
    async fn cache_set(&self, name: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;
}

/// At most `max` requests per client within `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    pub max: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

/// Budget accounting behind the gateway's rate limiter. Each call spends one
/// request of `client` on `route`.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn check(&self, route: &str, client: &str, quota: RateQuota) -> Result<RateDecision, StoreError>;
}

/// Orders clips for a feed. Shared by every backend so ordering does not
/// depend on index internals.
pub fn sort_clips(clips: &mut [Clip], order: ClipOrder) {
    clips.sort_by(|a, b| compare_clips(a, b, order));
}

/// Newest comment first; equal timestamps fall back to id.
pub fn sort_comments(comments: &mut [Comment]) {
    comments.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
}

fn compare_clips(a: &Clip, b: &Clip, order: ClipOrder) -> Ordering {
    let by_date = b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id));
    match order {
        ClipOrder::Recent => by_date,
        ClipOrder::Top => b.likes.cmp(&a.likes).then(by_date),
    }
}
