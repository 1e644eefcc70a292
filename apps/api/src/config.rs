use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Upper bound on request text, in bytes.
    pub max_input_bytes: usize,
    /// Upper bound on the keyword list of a single request.
    pub max_keywords: usize,
    /// N-gram list length used when a request does not pass `limit`.
    pub ngram_default_limit: usize,
    /// Fixes the enhancement RNG for requests that do not pass their own seed.
    pub enhancement_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            max_input_bytes: 200_000,
            max_keywords: 100,
            ngram_default_limit: 50,
            enhancement_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();

        Ok(Config {
            port: parse_env("PORT")?.unwrap_or(defaults.port),
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            max_input_bytes: parse_env("MAX_INPUT_BYTES")?.unwrap_or(defaults.max_input_bytes),
            max_keywords: parse_env("MAX_KEYWORDS")?.unwrap_or(defaults.max_keywords),
            ngram_default_limit: parse_env("NGRAM_DEFAULT_LIMIT")?
                .unwrap_or(defaults.ngram_default_limit),
            enhancement_seed: parse_env("ENHANCEMENT_SEED")?,
        })
    }
}

/// Reads and parses an optional variable. Unset is `None`; set but unparsable is an error.
fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(None),
    }
}
