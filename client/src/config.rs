use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:7860";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_BUDGET_SECS: u64 = 45;
pub const DEFAULT_HISTORY_DIR: &str = ".cassava";
pub const DEFAULT_FALLBACK_SEED: u64 = 42;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
    #[error("API URL must start with http:// or https://: {0}")]
    InvalidUrl(String),
}

/// Settings for the remote client, the fallback predictor and the history
/// store. Everything the client talks to is named here explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Wall-clock cap on one predict call, retries and backoff included.
    /// Each attempt's deadline shrinks to what is left of it.
    pub retry_budget: Duration,
    pub history_dir: PathBuf,
    pub fallback_seed: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            retry_budget: Duration::from_secs(DEFAULT_RETRY_BUDGET_SECS),
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
            fallback_seed: DEFAULT_FALLBACK_SEED,
        }
    }
}

impl ClientConfig {
    /// Reads `CASSAVA_*` variables, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("CASSAVA_API_URL").unwrap_or(defaults.api_url);
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(api_url));
        }

        let timeout = parse_var(&lookup, "CASSAVA_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let max_retries =
            parse_var(&lookup, "CASSAVA_MAX_RETRIES")?.unwrap_or(defaults.max_retries);
        let retry_delay = parse_var(&lookup, "CASSAVA_RETRY_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_delay);
        let retry_budget = parse_var(&lookup, "CASSAVA_RETRY_BUDGET_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_budget);
        let history_dir = lookup("CASSAVA_HISTORY_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.history_dir);
        let fallback_seed =
            parse_var(&lookup, "CASSAVA_FALLBACK_SEED")?.unwrap_or(defaults.fallback_seed);

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries,
            retry_delay,
            retry_budget,
            history_dir,
            fallback_seed,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(None),
    }
}
