pub mod serve;
pub mod stats;
pub mod token;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use ohclips::{AppConfig, DocumentStore, MemoryStore, RedisStore, StoreBackend};

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum BackendArg {
    Redis,
    Memory,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Redis => StoreBackend::Redis,
            BackendArg::Memory => StoreBackend::Memory,
        }
    }
}

pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Redis => Arc::new(
            RedisStore::connect(&config.redis_url, &config.key_prefix)
                .await
                .with_context(|| format!("connecting to {}", config.redis_url))?,
        ),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
