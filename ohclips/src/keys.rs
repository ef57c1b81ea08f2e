/// Key-construction helpers for every document and index the store touches.
///
/// Layout (all under a configurable prefix):
/// - `usernames:{username}` public user document, `usernames:{username}:following` its follow set
/// - `uids:{uid}` principal id to username index
/// - `clips:{id}` clip document, with `:likes` (hash keyed by username) and `:comments` (sorted by date)
/// - `idx:clips:*` sorted-set feed indexes
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    pub fn user(&self, username: &str) -> String {
        format!("{}:usernames:{}", self.prefix, username)
    }

    pub fn following(&self, username: &str) -> String {
        format!("{}:usernames:{}:following", self.prefix, username)
    }

    pub fn principal(&self, uid: &str) -> String {
        format!("{}:uids:{}", self.prefix, uid)
    }

    /// Set of every registered username; its cardinality is the user count.
    pub fn usernames_index(&self) -> String {
        format!("{}:idx:usernames", self.prefix)
    }

    pub fn clip(&self, clip_id: &str) -> String {
        format!("{}:clips:{}", self.prefix, clip_id)
    }

    pub fn clip_likes(&self, clip_id: &str) -> String {
        format!("{}:clips:{}:likes", self.prefix, clip_id)
    }

    pub fn clip_comments(&self, clip_id: &str) -> String {
        format!("{}:clips:{}:comments", self.prefix, clip_id)
    }

    /// Clip ids scored by upload time in milliseconds.
    pub fn recent_index(&self) -> String {
        format!("{}:idx:clips:date", self.prefix)
    }

    /// Clip ids scored by like count.
    pub fn top_index(&self) -> String {
        format!("{}:idx:clips:likes", self.prefix)
    }

    /// One author's clip ids scored by upload time in milliseconds.
    pub fn author_index(&self, username: &str) -> String {
        format!("{}:idx:clips:author:{}", self.prefix, username)
    }

    pub fn cache(&self, name: &str) -> String {
        format!("{}:cache:{}", self.prefix, name)
    }

    pub fn rate_window(&self, route: &str, client: &str) -> String {
        format!("{}:ratelimit:{}:{}", self.prefix, route, client)
    }
}
