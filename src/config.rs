use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::analysis_api::{DEFAULT_ANALYSIS_MODEL, OPENROUTER_BASE_URL};
use crate::api::odds_api::ODDS_API_BASE_URL;

/// Application configuration loaded from environment variables.
///
/// Both API keys are optional: without an odds key the board only offers
/// the simulation league, and without an analysis key the value analysis
/// reports that it isn't configured.
#[derive(Debug, Clone)]
pub struct Config {
    pub odds_api_key: Option<String>,
    pub odds_api_base_url: String,
    pub analysis_api_key: Option<String>,
    pub analysis_base_url: String,
    pub analysis_model: String,
    /// How long a league's odds are reused before asking the provider again
    pub odds_cache_ttl: Duration,
    /// Directory holding account documents
    pub data_dir: PathBuf,
    pub default_user_id: String,
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the environment (and `.env` if present)
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let ttl_secs: u64 = or("ODDS_CACHE_TTL_SECS", "300")
            .parse()
            .context("ODDS_CACHE_TTL_SECS must be a valid number")?;

        Ok(Config {
            odds_api_key: get("ODDS_API_KEY"),
            odds_api_base_url: or("ODDS_API_BASE_URL", ODDS_API_BASE_URL),
            analysis_api_key: get("OPENROUTER_API_KEY"),
            analysis_base_url: or("OPENROUTER_BASE_URL", OPENROUTER_BASE_URL),
            analysis_model: or("ANALYSIS_MODEL", DEFAULT_ANALYSIS_MODEL),
            odds_cache_ttl: Duration::from_secs(ttl_secs),
            data_dir: PathBuf::from(or("DATA_DIR", "data")),
            default_user_id: or("DEFAULT_USER_ID", "demo_user_123"),
            bind_addr: or("BIND_ADDR", "127.0.0.1:3000"),
        })
    }
}
