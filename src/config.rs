//! Configuration management

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub feeds: FeedsConfig,
    pub logging: LoggingConfig,
}

/// Outbound HTTP configuration, applied to the shared feed fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds; the updaters themselves never block
    /// without bound.
    pub timeout_seconds: u64,
}

/// Which feeds to synchronize and where to find them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    pub debian: DebianFeedConfig,
    pub ubuntu: UbuntuFeedConfig,
    pub alpine: AlpineFeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebianFeedConfig {
    pub enabled: bool,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UbuntuFeedConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Release channels to track, one OVAL stream and one marker each.
    pub releases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpineFeedConfig {
    pub enabled: bool,
    pub base_url: String,
    pub branches: Vec<String>,
    pub repositories: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                timeout_seconds: 30,
            },
            feeds: FeedsConfig {
                debian: DebianFeedConfig {
                    enabled: true,
                    url: crate::infrastructure::updaters::debian::DEFAULT_URL.to_string(),
                },
                ubuntu: UbuntuFeedConfig {
                    enabled: true,
                    base_url: crate::infrastructure::updaters::ubuntu::DEFAULT_BASE_URL
                        .to_string(),
                    releases: vec![
                        "focal".to_string(),
                        "jammy".to_string(),
                        "noble".to_string(),
                    ],
                },
                alpine: AlpineFeedConfig {
                    enabled: true,
                    base_url: crate::infrastructure::updaters::alpine::DEFAULT_BASE_URL
                        .to_string(),
                    branches: vec!["v3.18".to_string(), "v3.19".to_string()],
                    repositories: vec!["main".to_string(), "community".to_string()],
                },
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("VULNFEED").separator("__"));

        // Override with environment-specific config if ENV is set
        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder.build()?.try_deserialize()
    }
}
