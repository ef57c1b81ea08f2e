//! Documents stored by the adapters and the records returned to callers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public user document, keyed by lowercase username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDocument {
    pub uid: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A user document joined with its username and follow set.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub username: String,
    pub uid: String,
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
    pub following: BTreeSet<String>,
}

impl UserProfile {
    pub fn from_document(username: impl Into<String>, document: UserDocument, following: BTreeSet<String>) -> Self {
        Self {
            username: username.into(),
            uid: document.uid,
            photo_url: document.photo_url,
            created_at: document.created_at,
            following,
        }
    }

    /// The view other users get; the principal id stays private.
    pub fn public_view(&self) -> PublicProfile {
        PublicProfile {
            username: self.username.clone(),
            photo_url: self.photo_url.clone(),
            following: self.following.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicProfile {
    pub username: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub following: Vec<String>,
}

/// A registration request that has already passed validation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub uid: String,
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    pub fn document(&self) -> UserDocument {
        UserDocument {
            uid: self.uid.clone(),
            photo_url: self.photo_url.clone(),
            created_at: self.created_at,
        }
    }
}

/// An uploaded clip. `likes` caches the size of the clip's like set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub id: String,
    pub username: String,
    pub title: String,
    pub game: String,
    pub date: DateTime<Utc>,
    pub playback_id: String,
    pub avatar: String,
    pub likes: i64,
}

/// Presence of a like under a clip, keyed by the liker's username.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Like {
    pub date: DateTime<Utc>,
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub comment: String,
    pub date: DateTime<Utc>,
    pub uid: String,
    pub username: String,
    pub avatar: String,
}

/// Result of a like toggle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes: i64,
}

/// What a cascading clip delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub likes_removed: u64,
    pub comments_removed: u64,
}

/// A feed entry: the clip and every username that liked it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedClip {
    pub video: Clip,
    #[serde(rename = "likesArray")]
    pub likes_array: Vec<String>,
}

/// A single clip page: likes plus comments newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipDetail {
    pub video: Clip,
    #[serde(rename = "likesArray")]
    pub likes_array: Vec<String>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteCounts {
    pub users: u64,
    pub clips: u64,
}
