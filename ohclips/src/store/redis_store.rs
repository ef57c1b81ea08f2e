use std::{borrow::Cow, collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ClipFilter, ClipOrder, ClipQuery, DocumentStore, RateDecision, RateLimitStore, RateQuota, sort_clips, sort_comments};
use crate::{
    errors::StoreError,
    keys::KeyContext,
    runtime::{
        RedisExecutor, ScriptExecutor,
        commands::{
            AppendComment, DeleteClip, FollowOperation, HitWindow, InsertClip, MutateFollowing, RegisterUser,
            StoreCommand, ToggleLike,
        },
    },
    types::{Clip, Comment, DeleteReport, Like, LikeOutcome, NewUser, UserDocument, UserProfile},
};

/// Redis-backed store. Documents are JSON strings, like sets are hashes keyed
/// by username, comments and feed indexes are sorted sets. Every mutation
/// that touches more than one key runs as a Lua script.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, prefix))
    }

    pub fn keys(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn run(&self, command: StoreCommand) -> Result<Value, StoreError> {
        let mut conn = self.conn.clone();
        let mut executor = RedisExecutor::new(&mut conn);
        executor.execute(command).await
    }

    async fn load_clips(&self, ids: &[String]) -> Result<Vec<Clip>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.keys();
        let clip_keys: Vec<String> = ids.iter().map(|id| keys.clip(id)).collect();
        let mut conn = self.conn.clone();
        let raw: Vec<Option<String>> = redis::cmd("MGET").arg(&clip_keys).query_async(&mut conn).await?;
        // Ids whose clip vanished between the index read and MGET are skipped.
        raw.into_iter().flatten().map(|json| decode::<Clip>(&json)).collect()
    }

    /// Highest-scored ids of `index`, widened to include every member tied
    /// with the last one. Top scores only tie within one upload second.
    async fn ranked_ids(&self, index: &str, limit: Option<usize>) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let Some(limit) = limit else {
            let ids: Vec<String> = conn.zrevrange(index, 0, -1).await?;
            return Ok(ids);
        };
        let head: Vec<(String, f64)> = conn.zrevrange_withscores(index, 0, limit as isize - 1).await?;
        let Some((_, threshold)) = head.last() else {
            return Ok(Vec::new());
        };
        let ids: Vec<String> = conn.zrevrangebyscore(index, "+inf", *threshold).await?;
        Ok(ids)
    }
}

const TOP_DATE_SPAN: i64 = 1 << 32;

/// Top-index score: likes in the high part, upload second in the low 32 bits,
/// so one ZREVRANGE returns likes desc then newest first.
fn top_score(likes: i64, date: DateTime<Utc>) -> i64 {
    likes.max(0) * TOP_DATE_SPAN + date.timestamp().clamp(0, TOP_DATE_SPAN - 1)
}

fn decode<T: DeserializeOwned>(json: &str) -> Result<T, StoreError> {
    serde_json::from_str(json).map_err(StoreError::from)
}

fn reply_u64(value: &Value, field: &str) -> u64 {
    value.get(field).and_then(|v| v.as_u64()).unwrap_or(0)
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis().max(1) as u64
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn register_user(&self, user: &NewUser) -> Result<UserProfile, StoreError> {
        let keys = self.keys();
        let document = user.document();
        let command = StoreCommand::RegisterUser(RegisterUser {
            user_key: keys.user(&user.username),
            principal_key: keys.principal(&user.uid),
            usernames_index_key: keys.usernames_index(),
            username: user.username.clone(),
            uid: user.uid.clone(),
            document_json: serde_json::to_string(&document)?,
        });
        self.run(command).await?;
        Ok(UserProfile::from_document(&user.username, document, BTreeSet::new()))
    }

    async fn user(&self, username: &str) -> Result<Option<UserProfile>, StoreError> {
        let keys = self.keys();
        let mut conn = self.conn.clone();
        let (raw, following): (Option<String>, BTreeSet<String>) = redis::pipe()
            .get(keys.user(username))
            .smembers(keys.following(username))
            .query_async(&mut conn)
            .await?;
        match raw {
            Some(json) => {
                let document: UserDocument = decode(&json)?;
                Ok(Some(UserProfile::from_document(username, document, following)))
            }
            None => Ok(None),
        }
    }

    async fn username_for_principal(&self, uid: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let username: Option<String> = conn.get(self.keys().principal(uid)).await?;
        Ok(username)
    }

    async fn follow(&self, username: &str, target: &str) -> Result<(), StoreError> {
        let keys = self.keys();
        self.run(StoreCommand::MutateFollowing(MutateFollowing {
            user_key: keys.user(username),
            following_key: keys.following(username),
            target_key: keys.user(target),
            username: username.to_string(),
            target: target.to_string(),
            op: FollowOperation::Add,
        }))
        .await?;
        Ok(())
    }

    async fn unfollow(&self, username: &str, target: &str) -> Result<(), StoreError> {
        let keys = self.keys();
        self.run(StoreCommand::MutateFollowing(MutateFollowing {
            user_key: keys.user(username),
            following_key: keys.following(username),
            target_key: keys.user(target),
            username: username.to_string(),
            target: target.to_string(),
            op: FollowOperation::Remove,
        }))
        .await?;
        Ok(())
    }

    async fn user_count(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.scard(self.keys().usernames_index()).await?;
        Ok(count)
    }

    async fn insert_clip(&self, clip: &Clip) -> Result<(), StoreError> {
        let keys = self.keys();
        self.run(StoreCommand::InsertClip(InsertClip {
            clip_key: keys.clip(&clip.id),
            clip_id: clip.id.clone(),
            clip_json: serde_json::to_string(clip)?,
            recent_index_key: keys.recent_index(),
            top_index_key: keys.top_index(),
            author_index_key: keys.author_index(&clip.username),
            date_score: clip.date.timestamp_millis(),
            top_score: top_score(clip.likes, clip.date),
        }))
        .await?;
        Ok(())
    }

    async fn clip(&self, clip_id: &str) -> Result<Option<Clip>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.keys().clip(clip_id)).await?;
        raw.as_deref().map(decode::<Clip>).transpose()
    }

    async fn clips(&self, query: &ClipQuery) -> Result<Vec<Clip>, StoreError> {
        let keys = self.keys();
        let stop = query.limit.map(|limit| limit as isize - 1).unwrap_or(-1);
        if stop == -1 && query.limit.is_some() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = match (&query.filter, query.order) {
            (ClipFilter::All, ClipOrder::Top) => self.ranked_ids(&keys.top_index(), query.limit).await?,
            (ClipFilter::All, ClipOrder::Recent) => self.ranked_ids(&keys.recent_index(), query.limit).await?,
            (ClipFilter::Author(username), _) => self.ranked_ids(&keys.author_index(username), query.limit).await?,
            (ClipFilter::Authors(usernames), _) => {
                if usernames.is_empty() {
                    return Ok(Vec::new());
                }
                let mut pipe = redis::pipe();
                for username in usernames {
                    pipe.zrevrange(keys.author_index(username), 0, stop);
                }
                let mut conn = self.conn.clone();
                let per_author: Vec<Vec<String>> = pipe.query_async(&mut conn).await?;
                per_author.into_iter().flatten().collect()
            }
        };

        let mut clips = self.load_clips(&ids).await?;
        sort_clips(&mut clips, query.order);
        if let Some(limit) = query.limit {
            clips.truncate(limit);
        }
        Ok(clips)
    }

    async fn clip_count(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.zcard(self.keys().recent_index()).await?;
        Ok(count)
    }

    async fn delete_clip(&self, clip_id: &str, owner: &str) -> Result<DeleteReport, StoreError> {
        let keys = self.keys();
        let reply = self
            .run(StoreCommand::DeleteClip(DeleteClip {
                clip_key: keys.clip(clip_id),
                clip_id: clip_id.to_string(),
                owner: owner.to_string(),
                likes_key: keys.clip_likes(clip_id),
                comments_key: keys.clip_comments(clip_id),
                recent_index_key: keys.recent_index(),
                top_index_key: keys.top_index(),
                author_index_key: keys.author_index(owner),
            }))
            .await?;
        Ok(DeleteReport {
            likes_removed: reply_u64(&reply, "likes_removed"),
            comments_removed: reply_u64(&reply, "comments_removed"),
        })
    }

    async fn toggle_like(&self, clip_id: &str, username: &str, like: &Like) -> Result<LikeOutcome, StoreError> {
        let keys = self.keys();
        let reply = self
            .run(StoreCommand::ToggleLike(ToggleLike {
                clip_key: keys.clip(clip_id),
                clip_id: clip_id.to_string(),
                likes_key: keys.clip_likes(clip_id),
                top_index_key: keys.top_index(),
                top_date_span: TOP_DATE_SPAN,
                username: username.to_string(),
                like_json: serde_json::to_string(like)?,
            }))
            .await?;
        let liked = reply.get("liked").and_then(|v| v.as_bool()).ok_or(StoreError::Other {
            message: Cow::Borrowed("toggle_like reply is missing 'liked'"),
        })?;
        Ok(LikeOutcome {
            liked,
            likes: reply_u64(&reply, "likes") as i64,
        })
    }

    async fn likes_for_many(&self, clip_ids: &[String]) -> Result<Vec<Vec<String>>, StoreError> {
        if clip_ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.keys();
        let mut pipe = redis::pipe();
        for id in clip_ids {
            pipe.hkeys(keys.clip_likes(id));
        }
        let mut conn = self.conn.clone();
        let mut rows: Vec<Vec<String>> = pipe.query_async(&mut conn).await?;
        for row in &mut rows {
            row.sort();
        }
        Ok(rows)
    }

    async fn append_comment(&self, clip_id: &str, comment: &Comment) -> Result<Comment, StoreError> {
        let keys = self.keys();
        self.run(StoreCommand::AppendComment(AppendComment {
            clip_key: keys.clip(clip_id),
            clip_id: clip_id.to_string(),
            comments_key: keys.clip_comments(clip_id),
            comment_json: serde_json::to_string(comment)?,
            date_score: comment.date.timestamp_millis(),
        }))
        .await?;
        Ok(comment.clone())
    }

    async fn comments(&self, clip_id: &str) -> Result<Vec<Comment>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.zrevrange(self.keys().clip_comments(clip_id), 0, -1).await?;
        let mut comments = raw.iter().map(|json| decode::<Comment>(json)).collect::<Result<Vec<_>, _>>()?;
        sort_comments(&mut comments);
        Ok(comments)
    }

    async fn cache_get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.keys().cache(name)).await?;
        Ok(value)
    }

    async fn cache_set(&self, name: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(self.keys().cache(name), value, ttl.as_secs().max(1)).await?;
        Ok(())
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    /// Fixed window shared by every gateway instance.
    async fn check(&self, route: &str, client: &str, quota: RateQuota) -> Result<RateDecision, StoreError> {
        let reply = self
            .run(StoreCommand::HitWindow(HitWindow {
                window_key: self.keys().rate_window(route, client),
                window_ms: millis(quota.window),
            }))
            .await?;
        if reply_u64(&reply, "count") > u64::from(quota.max) {
            return Ok(RateDecision::Limited {
                retry_after: Duration::from_millis(reply_u64(&reply, "reset_after_ms")),
            });
        }
        Ok(RateDecision::Allowed)
    }
}
