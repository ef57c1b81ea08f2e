use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap},
    num::NonZeroU32,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use governor::{
    DefaultKeyedRateLimiter, Quota, RateLimiter,
    clock::{Clock, DefaultClock},
};

use super::{ClipFilter, ClipQuery, DocumentStore, RateDecision, RateLimitStore, RateQuota, sort_clips, sort_comments};
use crate::{
    errors::StoreError,
    types::{Clip, Comment, DeleteReport, Like, LikeOutcome, NewUser, UserDocument, UserProfile},
};

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<String, UserDocument>,
    following: HashMap<String, BTreeSet<String>>,
    principals: HashMap<String, String>,
    clips: HashMap<String, Clip>,
    likes: HashMap<String, BTreeMap<String, Like>>,
    comments: HashMap<String, Vec<Comment>>,
    cache: HashMap<String, (String, Instant)>,
}

/// Client keys a route limiter holds before idle ones are evicted.
const LIMITER_RETAIN_THRESHOLD: usize = 4096;

type RouteLimiter = Arc<DefaultKeyedRateLimiter<String>>;

/// Process-local store. Each operation runs under one lock, which gives the
/// same atomicity the Redis scripts provide.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    limiters: Mutex<HashMap<String, RouteLimiter>>,
    clip_queries: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clip listing queries served so far.
    pub fn clip_queries(&self) -> u64 {
        self.clip_queries.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Other {
            message: Cow::Borrowed("memory store lock poisoned"),
        })
    }
}

fn limiter_for(quota: RateQuota) -> Result<RouteLimiter, StoreError> {
    let invalid = || StoreError::Other {
        message: Cow::Owned(format!("invalid rate quota {quota:?}")),
    };
    let burst = NonZeroU32::new(quota.max).ok_or_else(invalid)?;
    let quota = Quota::with_period(quota.window / quota.max)
        .ok_or_else(invalid)?
        .allow_burst(burst);
    Ok(Arc::new(RateLimiter::keyed(quota)))
}

impl MemoryState {
    fn profile(&self, username: &str) -> Option<UserProfile> {
        self.users.get(username).map(|document| {
            let following = self.following.get(username).cloned().unwrap_or_default();
            UserProfile::from_document(username, document.clone(), following)
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn register_user(&self, user: &NewUser) -> Result<UserProfile, StoreError> {
        let mut state = self.lock()?;
        if state.users.contains_key(&user.username) {
            return Err(StoreError::UniqueConstraintViolation {
                field: "username".into(),
                value: user.username.clone(),
            });
        }
        if state.principals.contains_key(&user.uid) {
            return Err(StoreError::UniqueConstraintViolation {
                field: "account".into(),
                value: user.uid.clone(),
            });
        }
        state.users.insert(user.username.clone(), user.document());
        state.principals.insert(user.uid.clone(), user.username.clone());
        Ok(UserProfile::from_document(&user.username, user.document(), BTreeSet::new()))
    }

    async fn user(&self, username: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.lock()?.profile(username))
    }

    async fn username_for_principal(&self, uid: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.principals.get(uid).cloned())
    }

    async fn follow(&self, username: &str, target: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        for name in [username, target] {
            if !state.users.contains_key(name) {
                return Err(StoreError::NotFound {
                    document: Some(name.to_string()),
                });
            }
        }
        state
            .following
            .entry(username.to_string())
            .or_default()
            .insert(target.to_string());
        Ok(())
    }

    async fn unfollow(&self, username: &str, target: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(username) {
            return Err(StoreError::NotFound {
                document: Some(username.to_string()),
            });
        }
        if let Some(set) = state.following.get_mut(username) {
            set.remove(target);
        }
        Ok(())
    }

    async fn user_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.users.len() as u64)
    }

    async fn insert_clip(&self, clip: &Clip) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.clips.contains_key(&clip.id) {
            return Err(StoreError::UniqueConstraintViolation {
                field: "clip".into(),
                value: clip.id.clone(),
            });
        }
        state.clips.insert(clip.id.clone(), clip.clone());
        Ok(())
    }

    async fn clip(&self, clip_id: &str) -> Result<Option<Clip>, StoreError> {
        Ok(self.lock()?.clips.get(clip_id).cloned())
    }

    async fn clips(&self, query: &ClipQuery) -> Result<Vec<Clip>, StoreError> {
        self.clip_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.lock()?;
        let mut clips: Vec<Clip> = state
            .clips
            .values()
            .filter(|clip| match &query.filter {
                ClipFilter::All => true,
                ClipFilter::Author(username) => &clip.username == username,
                ClipFilter::Authors(usernames) => usernames.contains(&clip.username),
            })
            .cloned()
            .collect();
        sort_clips(&mut clips, query.order);
        if let Some(limit) = query.limit {
            clips.truncate(limit);
        }
        Ok(clips)
    }

    async fn clip_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.clips.len() as u64)
    }

    async fn delete_clip(&self, clip_id: &str, owner: &str) -> Result<DeleteReport, StoreError> {
        let mut state = self.lock()?;
        match state.clips.get(clip_id) {
            None => {
                return Err(StoreError::NotFound {
                    document: Some(clip_id.to_string()),
                });
            }
            Some(clip) if clip.username != owner => {
                return Err(StoreError::NotOwner {
                    document: clip_id.to_string(),
                });
            }
            Some(_) => {}
        }
        let likes_removed = state.likes.remove(clip_id).map(|likes| likes.len()).unwrap_or(0);
        let comments_removed = state.comments.remove(clip_id).map(|comments| comments.len()).unwrap_or(0);
        state.clips.remove(clip_id);
        Ok(DeleteReport {
            likes_removed: likes_removed as u64,
            comments_removed: comments_removed as u64,
        })
    }

    async fn toggle_like(&self, clip_id: &str, username: &str, like: &Like) -> Result<LikeOutcome, StoreError> {
        let mut state = self.lock()?;
        if !state.clips.contains_key(clip_id) {
            return Err(StoreError::NotFound {
                document: Some(clip_id.to_string()),
            });
        }
        let likes = state.likes.entry(clip_id.to_string()).or_default();
        let liked = if likes.remove(username).is_some() {
            false
        } else {
            likes.insert(username.to_string(), like.clone());
            true
        };
        let count = likes.len() as i64;
        if let Some(clip) = state.clips.get_mut(clip_id) {
            clip.likes = count;
        }
        Ok(LikeOutcome { liked, likes: count })
    }

    async fn likes_for_many(&self, clip_ids: &[String]) -> Result<Vec<Vec<String>>, StoreError> {
        let state = self.lock()?;
        Ok(clip_ids
            .iter()
            .map(|id| {
                state
                    .likes
                    .get(id)
                    .map(|likes| likes.keys().cloned().collect())
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn append_comment(&self, clip_id: &str, comment: &Comment) -> Result<Comment, StoreError> {
        let mut state = self.lock()?;
        if !state.clips.contains_key(clip_id) {
            return Err(StoreError::NotFound {
                document: Some(clip_id.to_string()),
            });
        }
        state
            .comments
            .entry(clip_id.to_string())
            .or_default()
            .push(comment.clone());
        Ok(comment.clone())
    }

    async fn comments(&self, clip_id: &str) -> Result<Vec<Comment>, StoreError> {
        let state = self.lock()?;
        let mut comments = state.comments.get(clip_id).cloned().unwrap_or_default();
        sort_comments(&mut comments);
        Ok(comments)
    }

    async fn cache_get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.lock()?;
        match state.cache.get(name) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                state.cache.remove(name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn cache_set(&self, name: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .cache
            .insert(name.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    /// Per-process GCRA: the full quota is available as a burst and refills
    /// evenly over the window.
    async fn check(&self, route: &str, client: &str, quota: RateQuota) -> Result<RateDecision, StoreError> {
        let limiter = {
            let mut limiters = self.limiters.lock().map_err(|_| StoreError::Other {
                message: Cow::Borrowed("rate limiter lock poisoned"),
            })?;
            match limiters.get(route) {
                Some(limiter) => limiter.clone(),
                None => {
                    let limiter = limiter_for(quota)?;
                    limiters.insert(route.to_string(), limiter.clone());
                    limiter
                }
            }
        };
        if limiter.len() > LIMITER_RETAIN_THRESHOLD {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
        match limiter.check_key(&client.to_string()) {
            Ok(()) => Ok(RateDecision::Allowed),
            Err(not_until) => Ok(RateDecision::Limited {
                retry_after: not_until.wait_time_from(DefaultClock::default().now()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_user(username: &str, uid: &str) -> NewUser {
        NewUser {
            username: username.into(),
            uid: uid.into(),
            photo_url: format!("https://example.com/{username}.svg"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn registration_is_unique_both_ways() {
        let store = MemoryStore::new();
        store.register_user(&new_user("alice", "u1")).await.expect("register");
        let taken = store.register_user(&new_user("alice", "u2")).await;
        assert!(matches!(taken, Err(StoreError::UniqueConstraintViolation { ref field, .. }) if field == "username"));
        let reused = store.register_user(&new_user("bob", "u1")).await;
        assert!(matches!(reused, Err(StoreError::UniqueConstraintViolation { ref field, .. }) if field == "account"));
    }

    #[tokio::test]
    async fn rate_quota_is_per_route_and_client() {
        let store = MemoryStore::new();
        let quota = RateQuota {
            max: 2,
            window: Duration::from_secs(3600),
        };
        assert_eq!(store.check("like", "1.2.3.4", quota).await.unwrap(), RateDecision::Allowed);
        assert_eq!(store.check("like", "1.2.3.4", quota).await.unwrap(), RateDecision::Allowed);
        let RateDecision::Limited { retry_after } = store.check("like", "1.2.3.4", quota).await.unwrap() else {
            panic!("third request should be limited");
        };
        assert!(retry_after > Duration::ZERO && retry_after <= quota.window);

        assert_eq!(store.check("like", "5.6.7.8", quota).await.unwrap(), RateDecision::Allowed);
        assert_eq!(store.check("upload", "1.2.3.4", quota).await.unwrap(), RateDecision::Allowed);
    }

    #[tokio::test]
    async fn rate_budget_refills_over_the_window() {
        let store = MemoryStore::new();
        let quota = RateQuota {
            max: 1,
            window: Duration::from_millis(20),
        };
        assert_eq!(store.check("like", "1.2.3.4", quota).await.unwrap(), RateDecision::Allowed);
        assert!(matches!(
            store.check("like", "1.2.3.4", quota).await.unwrap(),
            RateDecision::Limited { .. }
        ));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.check("like", "1.2.3.4", quota).await.unwrap(), RateDecision::Allowed);
    }

    #[test]
    fn empty_quota_is_rejected() {
        let quota = RateQuota {
            max: 0,
            window: Duration::from_secs(1),
        };
        assert!(limiter_for(quota).is_err());
    }

    #[tokio::test]
    async fn cache_entries_expire() {
        let store = MemoryStore::new();
        store.cache_set("games", "[]", Duration::from_millis(10)).await.unwrap();
        assert_eq!(store.cache_get("games").await.unwrap().as_deref(), Some("[]"));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.cache_get("games").await.unwrap(), None);
    }
}
