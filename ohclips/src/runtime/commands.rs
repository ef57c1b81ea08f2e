use serde::Serialize;

/// A single atomic mutation. Each variant is handled by its own Lua script,
/// which receives the serialized command as `ARGV[1]`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreCommand {
    RegisterUser(RegisterUser),
    InsertClip(InsertClip),
    ToggleLike(ToggleLike),
    AppendComment(AppendComment),
    DeleteClip(DeleteClip),
    MutateFollowing(MutateFollowing),
    HitWindow(HitWindow),
}

impl StoreCommand {
    pub fn name(&self) -> &'static str {
        match self {
            StoreCommand::RegisterUser(_) => "register_user",
            StoreCommand::InsertClip(_) => "insert_clip",
            StoreCommand::ToggleLike(_) => "toggle_like",
            StoreCommand::AppendComment(_) => "append_comment",
            StoreCommand::DeleteClip(_) => "delete_clip",
            StoreCommand::MutateFollowing(_) => "mutate_following",
            StoreCommand::HitWindow(_) => "hit_window",
        }
    }
}

/// Claims a username and a principal id together; fails if either is taken.
#[derive(Debug, Serialize)]
pub struct RegisterUser {
    pub user_key: String,
    pub principal_key: String,
    pub usernames_index_key: String,
    pub username: String,
    pub uid: String,
    pub document_json: String,
}

/// Stores a new clip and adds it to every feed index.
#[derive(Debug, Serialize)]
pub struct InsertClip {
    pub clip_key: String,
    pub clip_id: String,
    pub clip_json: String,
    pub recent_index_key: String,
    pub top_index_key: String,
    pub author_index_key: String,
    pub date_score: i64,
    /// Likes above `2^32`, upload second below.
    pub top_score: i64,
}

/// Adds or removes the like of `username` and rewrites the clip counter from
/// the like set cardinality in the same script call.
#[derive(Debug, Serialize)]
pub struct ToggleLike {
    pub clip_key: String,
    pub clip_id: String,
    pub likes_key: String,
    pub top_index_key: String,
    pub top_date_span: i64,
    pub username: String,
    pub like_json: String,
}

/// Appends a comment, refusing if the parent clip is gone.
#[derive(Debug, Serialize)]
pub struct AppendComment {
    pub clip_key: String,
    pub clip_id: String,
    pub comments_key: String,
    pub comment_json: String,
    pub date_score: i64,
}

/// Removes a clip owned by `owner` together with its likes, comments and index entries.
#[derive(Debug, Serialize)]
pub struct DeleteClip {
    pub clip_key: String,
    pub clip_id: String,
    pub owner: String,
    pub likes_key: String,
    pub comments_key: String,
    pub recent_index_key: String,
    pub top_index_key: String,
    pub author_index_key: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FollowOperation {
    Add,
    Remove,
}

#[derive(Debug, Serialize)]
pub struct MutateFollowing {
    pub user_key: String,
    pub following_key: String,
    pub target_key: String,
    pub username: String,
    pub target: String,
    pub op: FollowOperation,
}

/// Counts one hit in a fixed rate-limit window, starting the window on the first hit.
#[derive(Debug, Serialize)]
pub struct HitWindow {
    pub window_key: String,
    pub window_ms: u64,
}
