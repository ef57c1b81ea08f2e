#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ohclips::{
    AppConfig, AppState, Clip, DocumentStore, EngagementService, FeedService, MemoryStore, ServiceResult, StoreBackend,
    catalog::{GameSource, RawGame},
    engagement::avatar_url,
    filter::WordListFilter,
    gateway::{Collaborators, JwtAuthenticator},
    types::NewUser,
    uploads::{Passthrough, UploadTicket, VideoHost},
};

pub const TEST_SECRET: &str = "test-secret";

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn uid_for(username: &str) -> String {
    format!("uid-{username}")
}

pub async fn register(store: &dyn DocumentStore, username: &str) {
    store
        .register_user(&NewUser {
            username: username.to_string(),
            uid: uid_for(username),
            photo_url: avatar_url(username),
            created_at: base_time(),
        })
        .await
        .expect("register user");
}

/// Inserts a clip owned by `owner`, `minutes` after [`base_time`].
pub async fn seed_clip(store: &dyn DocumentStore, id: &str, owner: &str, minutes: i64) -> Clip {
    let clip = Clip {
        id: id.to_string(),
        username: owner.to_string(),
        title: format!("clip {id}"),
        game: "Valorant".to_string(),
        date: base_time() + Duration::minutes(minutes),
        playback_id: format!("pb-{id}"),
        avatar: avatar_url(owner),
        likes: 0,
    };
    store.insert_clip(&clip).await.expect("insert clip");
    clip
}

pub struct Services {
    pub store: Arc<MemoryStore>,
    pub engagement: EngagementService,
    pub feeds: FeedService,
}

pub fn services() -> Services {
    let store = Arc::new(MemoryStore::new());
    Services {
        engagement: EngagementService::new(store.clone(), Arc::new(WordListFilter::default())),
        feeds: FeedService::new(store.clone()),
        store,
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::defaults().expect("default config");
    config.app_env = "test".to_string();
    config.store_backend = StoreBackend::Memory;
    config.auth_secret = TEST_SECRET.to_string();
    config
}

pub fn token_for(principal: &str) -> String {
    JwtAuthenticator::new(TEST_SECRET)
        .issue(principal, Duration::minutes(10))
        .expect("issue token")
}

/// Video host that hands out a predictable URL and records what it was asked for.
#[derive(Default)]
pub struct FakeVideoHost {
    pub requests: std::sync::Mutex<Vec<Passthrough>>,
}

#[async_trait]
impl VideoHost for FakeVideoHost {
    async fn create_upload(&self, passthrough: &Passthrough) -> ServiceResult<UploadTicket> {
        self.requests.lock().unwrap().push(passthrough.clone());
        Ok(UploadTicket {
            url: "https://storage.example.com/upload/abc".to_string(),
        })
    }
}

#[derive(Default)]
pub struct FakeGames {
    pub fetches: AtomicUsize,
}

#[async_trait]
impl GameSource for FakeGames {
    async fn fetch_games(&self) -> ServiceResult<Vec<RawGame>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            RawGame {
                name: "Valorant".to_string(),
                box_art_url: "https://cdn.example.com/valorant-{width}x{height}.jpg".to_string(),
            },
            RawGame {
                name: "Ghostrunner".to_string(),
                box_art_url: "https://cdn.example.com/ghostrunner-{width}x{height}.jpg".to_string(),
            },
        ])
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub video_host: Arc<FakeVideoHost>,
    pub games: Arc<FakeGames>,
}

pub fn test_app() -> TestApp {
    test_app_with(test_config())
}

pub fn test_app_with(config: AppConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let video_host = Arc::new(FakeVideoHost::default());
    let games = Arc::new(FakeGames::default());
    let state = AppState::new(
        config,
        Collaborators {
            store: store.clone(),
            rate_limits: store.clone(),
            authenticator: Arc::new(JwtAuthenticator::new(TEST_SECRET)),
            video_host: video_host.clone(),
            games: games.clone(),
            filter: Arc::new(WordListFilter::default()),
        },
    );
    TestApp {
        state,
        store,
        video_host,
        games,
    }
}

static TEST_NAMESPACE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Key prefix unique to one Redis-backed test.
pub struct TestNamespace {
    pub prefix: String,
}

impl TestNamespace {
    pub fn unique() -> Self {
        let idx = TEST_NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
        let salt = ohclips::id::new_comment_id();
        Self {
            prefix: format!("ohclips_test_{idx}_{}", &salt[..8]),
        }
    }

    pub async fn store(&self) -> ohclips::RedisStore {
        let url = std::env::var("OHCLIPS_TEST_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        ohclips::RedisStore::connect(&url, self.prefix.clone())
            .await
            .expect("redis store")
    }
}
