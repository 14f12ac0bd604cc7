use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_MEDIA_ROOT: &str = "media";
const DEFAULT_MEDIA_BASE_URL: &str = "/media";
/// Upload cap for a single image payload.
const DEFAULT_MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;
const DEFAULT_IMAGE_PROCESSING_TIMEOUT_SECS: u64 = 30;
const DEV_DEFAULT_JWT_SECRET: &str =
    "development_only_secret_key_change_me_in_any_real_deployment_0123456789";

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (postgres://... or sqlite://...)
    pub database_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// JWT signing secret (minimum 32 characters)
    #[serde(default = "default_jwt_secret")]
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// Root directory for stored media objects
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Public URL prefix under which media objects are served
    #[serde(default = "default_media_base_url")]
    pub media_base_url: String,

    /// Maximum accepted size for one uploaded image
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// Upper bound for the post-completion image conversion pass
    #[serde(default = "default_image_processing_timeout_secs")]
    pub image_processing_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Run embedded migrations on startup
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_jwt_secret() -> String {
    DEV_DEFAULT_JWT_SECRET.to_string()
}
fn default_jwt_expiration() -> u64 {
    3600
}
fn default_media_root() -> String {
    DEFAULT_MEDIA_ROOT.to_string()
}
fn default_media_base_url() -> String {
    DEFAULT_MEDIA_BASE_URL.to_string()
}
fn default_max_image_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}
fn default_image_processing_timeout_secs() -> u64 {
    DEFAULT_IMAGE_PROCESSING_TIMEOUT_SECS
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_auto_migrate() -> bool {
    true
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Loads configuration from `config/default.toml`, an environment-specific
/// overlay, and `UPKEEP_*` environment variables (highest precedence).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = std::env::var("UPKEEP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("UPKEEP"));

    // Containerized deployments commonly provide DATABASE_URL directly.
    if let Ok(url) = std::env::var("DATABASE_URL") {
        builder = builder.set_override("database_url", url)?;
    }

    let cfg: AppConfig = builder.build()?.try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    if cfg.is_production() && cfg.jwt_secret == DEV_DEFAULT_JWT_SECRET {
        return Err(ConfigError::Message(
            "jwt_secret must be set explicitly in production".to_string(),
        ));
    }

    Ok(cfg)
}

/// Initializes the global tracing subscriber. `log_level` seeds the env
/// filter unless RUST_LOG overrides it.
pub fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("upkeep_api={0},tower_http={0}", log_level)));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        assert_eq!(default_max_image_bytes(), 2 * 1024 * 1024);
        assert_eq!(default_port(), 8080);
        assert!(default_auto_migrate());
    }

    #[test]
    fn short_jwt_secret_fails_validation() {
        let cfg = AppConfig {
            database_url: "sqlite::memory:".into(),
            host: default_host(),
            port: default_port(),
            jwt_secret: "short".into(),
            jwt_expiration: default_jwt_expiration(),
            media_root: default_media_root(),
            media_base_url: default_media_base_url(),
            max_image_bytes: default_max_image_bytes(),
            image_processing_timeout_secs: default_image_processing_timeout_secs(),
            log_level: default_log_level(),
            log_json: false,
            environment: default_environment(),
            auto_migrate: true,
        };
        assert!(cfg.validate().is_err());
    }
}
