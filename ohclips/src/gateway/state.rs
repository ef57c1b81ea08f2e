use std::{sync::Arc, time::Duration};

use thiserror::Error;

use super::auth::{Authenticator, JwtAuthenticator};
use crate::{
    catalog::{CatalogService, GameSource, TwitchGameSource},
    config::{AppConfig, StoreBackend},
    engagement::EngagementService,
    errors::{ServiceError, StoreError},
    feed::FeedService,
    filter::{ContentFilter, WordListFilter},
    identity::IdentityResolver,
    store::{DocumentStore, MemoryStore, RateLimitStore, RedisStore},
    uploads::{MuxVideoHost, UploadService, VideoHost, WebhookVerifier},
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("client setup: {0}")]
    Service(#[from] ServiceError),
    #[error("profanity list: {0}")]
    Filter(#[from] regex::Error),
    #[error("OHCLIPS_AUTH_SECRET must be set to a private value in production")]
    InsecureAuthSecret,
}

/// Implementations behind each port of the gateway.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub video_host: Arc<dyn VideoHost>,
    pub games: Arc<dyn GameSource>,
    pub filter: Arc<dyn ContentFilter>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub identities: IdentityResolver,
    pub engagement: EngagementService,
    pub feeds: FeedService,
    pub uploads: UploadService,
    pub webhooks: WebhookVerifier,
    pub catalog: CatalogService,
    pub authenticator: Arc<dyn Authenticator>,
    pub rate_limits: Arc<dyn RateLimitStore>,
}

impl AppState {
    /// Builds the production collaborators described by `config`.
    pub async fn connect(config: AppConfig) -> Result<Self, StartupError> {
        if config.has_insecure_auth_secret() {
            return Err(StartupError::InsecureAuthSecret);
        }
        let (store, rate_limits): (Arc<dyn DocumentStore>, Arc<dyn RateLimitStore>) = match config.store_backend {
            StoreBackend::Redis => {
                let store = Arc::new(RedisStore::connect(&config.redis_url, &config.key_prefix).await?);
                log::info!("connected to redis at {} (prefix '{}')", config.redis_url, config.key_prefix);
                (store.clone(), store)
            }
            StoreBackend::Memory => {
                log::warn!("using in-memory store; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };
        let collaborators = Collaborators {
            store,
            rate_limits,
            authenticator: Arc::new(JwtAuthenticator::new(&config.auth_secret)),
            video_host: Arc::new(MuxVideoHost::new(
                &config.mux_token_id,
                &config.mux_token_secret,
                &config.mux_cors_origin,
            )?),
            games: Arc::new(TwitchGameSource::new(
                &config.twitch_client_id,
                &config.twitch_client_secret,
            )?),
            filter: Arc::new(WordListFilter::with_extra_terms(&config.profanity_extra_words())?),
        };
        Ok(Self::new(config, collaborators))
    }

    pub fn new(config: AppConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            rate_limits,
            authenticator,
            video_host,
            games,
            filter,
        } = collaborators;
        Self {
            webhooks: WebhookVerifier::new(&config.mux_webhook_secret),
            config: Arc::new(config),
            identities: IdentityResolver::new(store.clone()),
            engagement: EngagementService::new(store.clone(), filter),
            feeds: FeedService::new(store.clone()),
            uploads: UploadService::new(store.clone(), video_host),
            catalog: CatalogService::new(store, games),
            authenticator,
            rate_limits,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs.max(1))
    }
}
