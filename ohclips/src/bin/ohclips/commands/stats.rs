use anyhow::Result;
use clap::Args;
use ohclips::{AppConfig, FeedService, SiteCounts};
use serde::Serialize;

use super::{BackendArg, open_store};
use crate::output::{OutputManager, TableDisplay};

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Store backend (overrides OHCLIPS_STORE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,
}

#[derive(Serialize)]
struct StatsReport {
    #[serde(flatten)]
    counts: SiteCounts,
    key_prefix: String,
}

impl TableDisplay for StatsReport {
    fn rows(&self) -> Vec<(String, String)> {
        vec![
            ("users".to_string(), self.counts.users.to_string()),
            ("clips".to_string(), self.counts.clips.to_string()),
            ("key prefix".to_string(), self.key_prefix.clone()),
        ]
    }
}

pub async fn handle_stats(args: StatsArgs, mut config: AppConfig, output: &OutputManager) -> Result<()> {
    if let Some(backend) = args.backend {
        config.store_backend = backend.into();
    }
    let feeds = FeedService::new(open_store(&config).await?);
    let counts = feeds.counts().await?;
    output.display(
        "ohclips",
        &StatsReport {
            counts,
            key_prefix: config.key_prefix,
        },
    )
}
