use anyhow::{Result, anyhow, bail};
use clap::Args;
use ohclips::{AppConfig, gateway::JwtAuthenticator};

use crate::output::OutputManager;

/// One year.
pub const MAX_TTL_HOURS: i64 = 24 * 365;

#[derive(Args, Debug)]
pub struct TokenArgs {
    /// Principal id placed in the `sub` claim
    pub principal: String,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(i64).range(1..=MAX_TTL_HOURS))]
    pub ttl_hours: i64,
}

/// Mints a bearer token for local testing against the gateway.
pub fn handle_token(args: TokenArgs, config: &AppConfig, output: &OutputManager) -> Result<()> {
    if config.is_production() {
        bail!("refusing to mint tokens when OHCLIPS_APP_ENV=production");
    }
    let ttl = chrono::Duration::try_hours(args.ttl_hours).ok_or_else(|| anyhow!("--ttl-hours is out of range"))?;
    let token = JwtAuthenticator::new(&config.auth_secret).issue(&args.principal, ttl)?;
    output.key_value("principal", &args.principal);
    output.key_value("expires in", &format!("{}h", args.ttl_hours));
    println!("{token}");
    Ok(())
}
