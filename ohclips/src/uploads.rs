//! Direct-upload authorization and clip ingestion from the video host.

use std::{borrow::Cow, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;

use crate::{
    errors::{ServiceError, ServiceResult},
    id::new_clip_id,
    identity::IdentityResolver,
    store::DocumentStore,
    types::Clip,
    validators,
};

const MUX_UPLOADS_URL: &str = "https://api.mux.com/video/v1/uploads";
pub const ASSET_READY_EVENT: &str = "video.asset.ready";
pub const SIGNATURE_HEADER: &str = "mux-signature";
const SIGNATURE_TOLERANCE_SECS: u64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Metadata carried through the video host from upload to ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passthrough {
    pub title: String,
    pub game: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadTicket {
    pub url: String,
}

/// Mints direct-upload URLs on the video host.
#[async_trait]
pub trait VideoHost: Send + Sync {
    async fn create_upload(&self, passthrough: &Passthrough) -> ServiceResult<UploadTicket>;
}

#[derive(Deserialize)]
struct MuxUploadResponse {
    data: UploadTicket,
}

pub struct MuxVideoHost {
    http: Client,
    token_id: String,
    token_secret: String,
    cors_origin: String,
}

impl MuxVideoHost {
    pub fn new(
        token_id: impl Into<String>,
        token_secret: impl Into<String>,
        cors_origin: impl Into<String>,
    ) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(mux_failure)?;
        Ok(Self {
            http,
            token_id: token_id.into(),
            token_secret: token_secret.into(),
            cors_origin: cors_origin.into(),
        })
    }
}

fn mux_failure(err: reqwest::Error) -> ServiceError {
    log::error!("mux request failed: {err}");
    ServiceError::Upstream(Cow::Borrowed("Could not create upload"))
}

#[async_trait]
impl VideoHost for MuxVideoHost {
    async fn create_upload(&self, passthrough: &Passthrough) -> ServiceResult<UploadTicket> {
        let passthrough = serde_json::to_string(passthrough).map_err(|err| ServiceError::Store(err.into()))?;
        let body = json!({
            "cors_origin": self.cors_origin,
            "new_asset_settings": {
                "playback_policy": ["public"],
                "passthrough": passthrough,
            },
        });
        let response: MuxUploadResponse = self
            .http
            .post(MUX_UPLOADS_URL)
            .basic_auth(&self.token_id, Some(&self.token_secret))
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(mux_failure)?
            .json()
            .await
            .map_err(mux_failure)?;
        if !validators::is_valid_url(&response.data.url) {
            log::error!("mux returned an unusable upload url");
            return Err(ServiceError::Upstream(Cow::Borrowed("Could not create upload")));
        }
        Ok(response.data)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackId {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetData {
    #[serde(default)]
    pub playback_ids: Vec<PlaybackId>,
    pub passthrough: Option<String>,
}

/// Webhook envelope posted by the video host.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: AssetData,
}

/// Checks `mux-signature` (`t=<unix secs>,v1=<hex hmac>`) over `"<t>.<body>"`.
/// Without a secret every delivery is accepted.
#[derive(Clone, Default)]
pub struct WebhookVerifier {
    secret: Option<Arc<[u8]>>,
}

fn rejected(reason: &str) -> ServiceError {
    log::warn!("rejected webhook delivery: {reason}");
    ServiceError::Unauthorized
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Self {
        let secret = secret.trim();
        Self {
            secret: (!secret.is_empty()).then(|| Arc::from(secret.as_bytes())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    pub fn verify(&self, header: Option<&str>, body: &[u8], now: DateTime<Utc>) -> ServiceResult<()> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };
        let header = header.ok_or_else(|| rejected("missing signature"))?;
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = Some(value),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }
        let raw_timestamp = timestamp.ok_or_else(|| rejected("no timestamp"))?;
        let signed_at: i64 = raw_timestamp.parse().map_err(|_| rejected("unreadable timestamp"))?;
        if now.timestamp().abs_diff(signed_at) > SIGNATURE_TOLERANCE_SECS {
            return Err(rejected("stale timestamp"));
        }

        let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| rejected("unusable secret"))?;
        mac.update(raw_timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        let matched = signatures
            .iter()
            .filter_map(|signature| hex::decode(signature).ok())
            .any(|expected| mac.clone().verify_slice(&expected).is_ok());
        if !matched {
            return Err(rejected("signature mismatch"));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn DocumentStore>,
    identities: IdentityResolver,
    host: Arc<dyn VideoHost>,
}

impl UploadService {
    pub fn new(store: Arc<dyn DocumentStore>, host: Arc<dyn VideoHost>) -> Self {
        Self {
            identities: IdentityResolver::new(store.clone()),
            store,
            host,
        }
    }

    /// Returns a one-off upload URL for the caller's clip.
    pub async fn authorize_upload(&self, principal: &str, title: &str, game: &str) -> ServiceResult<UploadTicket> {
        if title.trim().is_empty() || game.trim().is_empty() {
            return Err(ServiceError::BadRequest(Cow::Borrowed("Missing required fields")));
        }
        let identity = self.identities.require(principal).await?;
        let (title, game) = validators::validate_upload(title, game)?;
        let passthrough = Passthrough {
            title,
            game,
            user_id: identity.username,
        };
        log::info!("authorizing upload for {}: {:?}", passthrough.user_id, passthrough.title);
        self.host.create_upload(&passthrough).await
    }

    /// Creates a clip when the host reports a ready asset. Returns the new
    /// clip, or `None` for events that need no action.
    pub async fn ingest(&self, event: VideoEvent) -> ServiceResult<Option<Clip>> {
        if event.kind != ASSET_READY_EVENT {
            log::debug!("ignoring video event {}", event.kind);
            return Ok(None);
        }
        let malformed = |what: &'static str| {
            log::error!("malformed {ASSET_READY_EVENT} event: {what}");
            ServiceError::Upstream(Cow::Borrowed("Something went wrong"))
        };
        let playback_id = event
            .data
            .playback_ids
            .first()
            .map(|playback| playback.id.clone())
            .ok_or_else(|| malformed("no playback id"))?;
        let raw = event.data.passthrough.as_deref().ok_or_else(|| malformed("no passthrough"))?;
        let passthrough: Passthrough = serde_json::from_str(raw).map_err(|_| malformed("unreadable passthrough"))?;

        let Some(owner) = self.store.user(&passthrough.user_id).await? else {
            return Err(malformed("unknown uploader"));
        };
        let clip = Clip {
            id: new_clip_id(),
            username: owner.username,
            title: passthrough.title,
            game: passthrough.game,
            date: Utc::now(),
            playback_id,
            avatar: owner.photo_url,
            likes: 0,
        };
        self.store.insert_clip(&clip).await?;
        log::info!("ingested clip {} for {}", clip.id, clip.username);
        Ok(Some(clip))
    }
}
