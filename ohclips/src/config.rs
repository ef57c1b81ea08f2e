use serde::Deserialize;

/// Signing secret used when none is configured. Never valid in production.
pub const DEV_AUTH_SECRET: &str = "dev-secret";

pub const DEFAULT_CORS_ORIGINS: &str = "http://127.0.0.1:5173,https://ohclips.netlify.app,https://ohclips.vercel.app";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub port: u16,
    pub log_level: String,
    pub redis_url: String,
    pub key_prefix: String,
    pub store_backend: StoreBackend,
    pub auth_secret: String,
    /// Comma separated list of allowed browser origins.
    pub cors_origins: String,
    pub request_timeout_secs: u64,
    pub mux_token_id: String,
    pub mux_token_secret: String,
    pub mux_cors_origin: String,
    /// Signing secret of the video host's webhooks. Empty disables verification.
    pub mux_webhook_secret: String,
    pub twitch_client_id: String,
    pub twitch_client_secret: String,
    /// Extra words masked in comments, comma separated.
    pub profanity_extra_words: String,
}

impl AppConfig {
    /// Reads `.env`, then `OHCLIPS_*` environment variables over the defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::builder()?
            .add_source(config::Environment::with_prefix("OHCLIPS").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Defaults only; environment is ignored.
    pub fn defaults() -> Result<Self, config::ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("port", 3001)?
            .set_default("log_level", "info")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("key_prefix", "ohclips")?
            .set_default("store_backend", "redis")?
            .set_default("auth_secret", DEV_AUTH_SECRET)?
            .set_default("cors_origins", DEFAULT_CORS_ORIGINS)?
            .set_default("request_timeout_secs", 30)?
            .set_default("mux_token_id", "")?
            .set_default("mux_token_secret", "")?
            .set_default("mux_cors_origin", "https://ohclips.vercel.app")?
            .set_default("mux_webhook_secret", "")?
            .set_default("twitch_client_id", "")?
            .set_default("twitch_client_secret", "")?
            .set_default("profanity_extra_words", "")
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// True when production would sign tokens with an empty or publicly
    /// known secret.
    pub fn has_insecure_auth_secret(&self) -> bool {
        let secret = self.auth_secret.trim();
        self.is_production() && (secret.is_empty() || secret == DEV_AUTH_SECRET)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        split_list(&self.cors_origins)
    }

    pub fn profanity_extra_words(&self) -> Vec<String> {
        split_list(&self.profanity_extra_words)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_development() {
        let config = AppConfig::defaults().expect("defaults");
        assert_eq!(config.port, 3001);
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(!config.is_production());
        assert_eq!(
            config.cors_origins(),
            vec![
                "http://127.0.0.1:5173".to_string(),
                "https://ohclips.netlify.app".to_string(),
                "https://ohclips.vercel.app".to_string(),
            ]
        );
        assert!(config.profanity_extra_words().is_empty());
    }

    #[test]
    fn production_rejects_default_and_blank_secrets() {
        let mut config = AppConfig::defaults().expect("defaults");
        assert!(!config.has_insecure_auth_secret());

        config.app_env = "production".to_string();
        assert!(config.has_insecure_auth_secret());
        config.auth_secret = "  ".to_string();
        assert!(config.has_insecure_auth_secret());
        config.auth_secret = "a-long-random-value".to_string();
        assert!(!config.has_insecure_auth_secret());
    }

    #[test]
    fn list_values_are_trimmed() {
        assert_eq!(split_list(" a, ,b "), vec!["a".to_string(), "b".to_string()]);
    }
}
