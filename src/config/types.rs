use serde::Deserialize;

/// Main configuration structure for Snapkeep
///
/// Every section is optional; a missing section falls back to its defaults so
/// the archiver can run without a configuration file at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Crawl budget, timeouts and pacing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Page budget used when a request does not name one
    #[serde(rename = "default-max-pages")]
    pub default_max_pages: u32,

    /// Timeout for a single page fetch (seconds)
    #[serde(rename = "page-timeout-secs")]
    pub page_timeout_secs: u64,

    /// Timeout for a single asset fetch (seconds)
    #[serde(rename = "asset-timeout-secs")]
    pub asset_timeout_secs: u64,

    /// Minimum spacing between asset requests (milliseconds)
    #[serde(rename = "asset-delay-ms")]
    pub asset_delay_ms: u64,

    /// Minimum spacing between page requests (milliseconds)
    #[serde(rename = "page-delay-ms")]
    pub page_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            default_max_pages: 20,
            page_timeout_secs: 30,
            asset_timeout_secs: 60,
            asset_delay_ms: 200,
            page_delay_ms: 1000,
        }
    }
}

/// User agent sent with every request
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    pub value: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory holding one subdirectory per archived host
    #[serde(rename = "data-dir")]
    pub data_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

/// Resource classifier configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Keep the built-in skip rules ahead of the configured ones
    #[serde(rename = "use-defaults")]
    pub use_defaults: bool,

    /// Extra skip rules, evaluated in order after the defaults
    pub rules: Vec<SkipRuleEntry>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            use_defaults: true,
            rules: Vec::new(),
        }
    }
}

/// A single configured skip rule
#[derive(Debug, Clone, Deserialize)]
pub struct SkipRuleEntry {
    /// One of "image", "stylesheet", "script" or "any"
    pub category: String,

    /// Case-insensitive regular expression matched against the raw reference
    pub pattern: String,
}
