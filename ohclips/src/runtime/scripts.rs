use redis::Script;
use std::sync::LazyLock;

pub const REGISTER_USER_SCRIPT_BODY: &str = include_str!("../../lua/register_user.lua");
pub const INSERT_CLIP_SCRIPT_BODY: &str = include_str!("../../lua/insert_clip.lua");
pub const TOGGLE_LIKE_SCRIPT_BODY: &str = include_str!("../../lua/toggle_like.lua");
pub const APPEND_COMMENT_SCRIPT_BODY: &str = include_str!("../../lua/append_comment.lua");
pub const DELETE_CLIP_SCRIPT_BODY: &str = include_str!("../../lua/delete_clip.lua");
pub const MUTATE_FOLLOWING_SCRIPT_BODY: &str = include_str!("../../lua/mutate_following.lua");
pub const HIT_WINDOW_SCRIPT_BODY: &str = include_str!("../../lua/hit_window.lua");

pub static REGISTER_USER_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(REGISTER_USER_SCRIPT_BODY));
pub static INSERT_CLIP_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(INSERT_CLIP_SCRIPT_BODY));
pub static TOGGLE_LIKE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(TOGGLE_LIKE_SCRIPT_BODY));
pub static APPEND_COMMENT_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(APPEND_COMMENT_SCRIPT_BODY));
pub static DELETE_CLIP_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(DELETE_CLIP_SCRIPT_BODY));
pub static MUTATE_FOLLOWING_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(MUTATE_FOLLOWING_SCRIPT_BODY));
pub static HIT_WINDOW_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(HIT_WINDOW_SCRIPT_BODY));
