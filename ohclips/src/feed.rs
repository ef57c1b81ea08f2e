//! Read-side feed assembly.

use std::{borrow::Cow, sync::Arc};

use crate::{
    errors::{ServiceError, ServiceResult},
    store::{ClipQuery, DocumentStore},
    types::{Clip, ClipDetail, EnrichedClip, PublicProfile, SiteCounts},
};

pub const DEFAULT_FEED_SIZE: usize = 20;
pub const MAX_FEED_SIZE: usize = 100;

/// Resolves the optional `max` query parameter to a usable limit.
pub fn clamp_max(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_FEED_SIZE).clamp(1, MAX_FEED_SIZE)
}

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn DocumentStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn recent(&self, max: usize) -> ServiceResult<Vec<EnrichedClip>> {
        let clips = self.store.clips(&ClipQuery::recent(max)).await?;
        self.enrich(clips).await
    }

    pub async fn top(&self, max: usize) -> ServiceResult<Vec<EnrichedClip>> {
        let clips = self.store.clips(&ClipQuery::top(max)).await?;
        self.enrich(clips).await
    }

    pub async fn by_author(&self, username: &str) -> ServiceResult<Vec<EnrichedClip>> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Ok(Vec::new());
        }
        let clips = self.store.clips(&ClipQuery::by_author(username)).await?;
        self.enrich(clips).await
    }

    /// Clips of everyone in `following`, newest first.
    pub async fn following<I, S>(&self, following: I) -> ServiceResult<Vec<EnrichedClip>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut authors: Vec<String> = following
            .into_iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        authors.sort();
        authors.dedup();
        let clips = self.store.clips(&ClipQuery::by_authors(authors)).await?;
        self.enrich(clips).await
    }

    /// Following feed of the user `username`.
    pub async fn following_of(&self, username: &str) -> ServiceResult<Vec<EnrichedClip>> {
        let profile = self.store.user(username).await?;
        match profile {
            Some(profile) => self.following(&profile.following).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn clip(&self, clip_id: &str) -> ServiceResult<ClipDetail> {
        let Some(video) = self.store.clip(clip_id).await? else {
            return Err(ServiceError::NotFound(Cow::Borrowed("Clip not found.")));
        };
        let mut likes = self.store.likes_for_many(std::slice::from_ref(&video.id)).await?;
        let comments = self.store.comments(&video.id).await?;
        Ok(ClipDetail {
            likes_array: likes.pop().unwrap_or_default(),
            video,
            comments,
        })
    }

    pub async fn profile(&self, username: &str) -> ServiceResult<PublicProfile> {
        let username = username.trim().to_lowercase();
        match self.store.user(&username).await? {
            Some(profile) => Ok(profile.public_view()),
            None => Err(ServiceError::NotFound(Cow::Borrowed("User not found."))),
        }
    }

    pub async fn counts(&self) -> ServiceResult<SiteCounts> {
        Ok(SiteCounts {
            users: self.store.user_count().await?,
            clips: self.store.clip_count().await?,
        })
    }

    async fn enrich(&self, clips: Vec<Clip>) -> ServiceResult<Vec<EnrichedClip>> {
        if clips.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = clips.iter().map(|clip| clip.id.clone()).collect();
        let likes = self.store.likes_for_many(&ids).await?;
        Ok(clips
            .into_iter()
            .zip(likes.into_iter().chain(std::iter::repeat_with(Vec::new)))
            .map(|(video, likes_array)| EnrichedClip { video, likes_array })
            .collect())
    }
}
