//! ohclips backend library.
//!
//! Clip engagement (likes, comments, follows, deletion), feed assembly and the
//! HTTP gateway in front of them, over a Redis or in-memory document store.

pub mod catalog;
pub mod config;
pub mod engagement;
pub mod errors;
pub mod feed;
pub mod filter;
pub mod gateway;
pub mod id;
pub mod identity;
pub mod keys;
pub mod logging;
pub mod runtime;
pub mod store;
pub mod types;
pub mod uploads;
pub mod validators;

pub use config::{AppConfig, StoreBackend};
pub use engagement::EngagementService;
pub use errors::{ServiceError, ServiceResult, StoreError, ValidationError, ValidationIssue};
pub use feed::FeedService;
pub use gateway::{AppState, router};
pub use identity::{Identity, IdentityResolver, Resolution};
pub use store::{DocumentStore, MemoryStore, RateLimitStore, RedisStore};
pub use types::{Clip, ClipDetail, Comment, EnrichedClip, Like, LikeOutcome, PublicProfile, SiteCounts};
