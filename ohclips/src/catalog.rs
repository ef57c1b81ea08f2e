//! Game catalog backed by the Twitch Helix API and cached in the store.

use std::{borrow::Cow, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{ServiceError, ServiceResult},
    store::DocumentStore,
};

const TWITCH_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const TWITCH_API_BASE: &str = "https://api.twitch.tv/helix";
const EXTRA_GAMES: [&str; 2] = ["Fallout 3", "Ghostrunner"];
const BOX_ART_WIDTH: &str = "285";
const BOX_ART_HEIGHT: &str = "380";

pub const GAMES_CACHE_KEY: &str = "games";
pub const GAMES_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Game {
    pub name: String,
    pub box_art_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Cache,
    Origin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameCatalog {
    pub source: CatalogSource,
    pub games: Vec<Game>,
}

/// A game as the upstream reports it, before box-art sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGame {
    pub name: String,
    pub box_art_url: String,
}

impl From<RawGame> for Game {
    fn from(raw: RawGame) -> Self {
        Self {
            name: raw.name,
            box_art_url: raw
                .box_art_url
                .replace("{width}", BOX_ART_WIDTH)
                .replace("{height}", BOX_ART_HEIGHT),
        }
    }
}

/// Upstream list of popular games.
#[async_trait]
pub trait GameSource: Send + Sync {
    async fn fetch_games(&self) -> ServiceResult<Vec<RawGame>>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct HelixGames {
    #[serde(default)]
    data: Vec<RawGame>,
}

fn upstream(err: reqwest::Error) -> ServiceError {
    log::error!("twitch request failed: {err}");
    ServiceError::Upstream(Cow::Borrowed("Issue fetching games list"))
}

/// Twitch Helix client using the client-credentials flow.
pub struct TwitchGameSource {
    http: Client,
    client_id: String,
    client_secret: String,
}

impl TwitchGameSource {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(upstream)?;
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    async fn access_token(&self) -> ServiceResult<String> {
        let token: TokenResponse = self
            .http
            .post(TWITCH_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(upstream)?
            .json()
            .await
            .map_err(upstream)?;
        token
            .access_token
            .ok_or(ServiceError::Upstream(Cow::Borrowed("Can't fetch access token for Twitch API")))
    }

    async fn helix(&self, token: &str, path: &str, query: &[(&str, &str)]) -> ServiceResult<Vec<RawGame>> {
        let games: HelixGames = self
            .http
            .get(format!("{TWITCH_API_BASE}{path}"))
            .query(query)
            .header("Client-Id", &self.client_id)
            .bearer_auth(token)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(upstream)?
            .json()
            .await
            .map_err(upstream)?;
        Ok(games.data)
    }
}

#[async_trait]
impl GameSource for TwitchGameSource {
    async fn fetch_games(&self) -> ServiceResult<Vec<RawGame>> {
        let token = self.access_token().await?;
        let mut games = self.helix(&token, "/games/top", &[("first", "100")]).await?;
        let extra: Vec<(&str, &str)> = EXTRA_GAMES.iter().map(|name| ("name", *name)).collect();
        games.extend(self.helix(&token, "/games", &extra).await?);
        Ok(games)
    }
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    source: Arc<dyn GameSource>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>, source: Arc<dyn GameSource>) -> Self {
        Self { store, source }
    }

    /// Cached game list, refreshed from the upstream once a day.
    pub async fn games(&self) -> ServiceResult<GameCatalog> {
        if let Some(cached) = self.store.cache_get(GAMES_CACHE_KEY).await? {
            match serde_json::from_str::<Vec<Game>>(&cached) {
                Ok(games) => {
                    return Ok(GameCatalog {
                        source: CatalogSource::Cache,
                        games,
                    });
                }
                Err(err) => log::warn!("discarding unreadable games cache: {err}"),
            }
        }

        let games: Vec<Game> = self.source.fetch_games().await?.into_iter().map(Game::from).collect();
        if games.is_empty() {
            return Err(ServiceError::Upstream(Cow::Borrowed("Issue fetching games list")));
        }
        let encoded = serde_json::to_string(&games).map_err(|err| ServiceError::Store(err.into()))?;
        self.store.cache_set(GAMES_CACHE_KEY, &encoded, GAMES_CACHE_TTL).await?;
        log::info!("refreshed games catalog ({} titles)", games.len());
        Ok(GameCatalog {
            source: CatalogSource::Origin,
            games,
        })
    }
}
