use crate::models::League;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";

/// One event from The Odds API. Bookmakers may be missing entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OddsApiEvent {
    pub id: String,
    #[serde(default)]
    pub sport_title: Option<String>,
    #[serde(default)]
    pub commence_time: Option<DateTime<Utc>>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Option<Vec<OddsApiBookmaker>>,
}

/// Bookmaker data from The Odds API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OddsApiBookmaker {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markets: Vec<OddsApiMarket>,
}

/// Market data (e.g., h2h) from The Odds API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OddsApiMarket {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<OddsApiOutcome>,
}

/// Outcome data for a specific team. The price is kept raw: a null or
/// garbled price must not sink the rest of the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OddsApiOutcome {
    pub name: String,
    #[serde(default)]
    pub price: serde_json::Value,
}

/// Entry of the `/sports` listing
#[derive(Debug, Deserialize)]
struct OddsApiSport {
    key: String,
    title: String,
    #[serde(default)]
    active: bool,
}

/// Request quota reported in The Odds API response headers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiUsage {
    pub remaining: Option<String>,
    pub used: Option<String>,
}

pub struct OddsApiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OddsApiClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, ODDS_API_BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build Odds API HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Fetch head-to-head (moneyline) odds for every event in a league
    pub async fn fetch_events(&self, league_key: &str) -> Result<Vec<OddsApiEvent>> {
        let url = format!("{}/sports/{}/odds", self.base_url, league_key);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", "us"),
                ("markets", "h2h"), // h2h = head-to-head (moneyline)
                ("oddsFormat", "american"),
            ])
            .send()
            .await
            .context("Failed to fetch odds from The Odds API")?;

        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error: {}", response.status());
        }

        let events: Vec<OddsApiEvent> = response
            .json()
            .await
            .context("Failed to parse Odds API response")?;

        debug!(league = league_key, events = events.len(), "Fetched odds");
        Ok(events)
    }

    /// List the leagues The Odds API knows about
    pub async fn fetch_leagues(&self) -> Result<Vec<League>> {
        let url = format!("{}/sports", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to fetch sports from The Odds API")?;

        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error: {}", response.status());
        }

        let sports: Vec<OddsApiSport> = response
            .json()
            .await
            .context("Failed to parse Odds API sports listing")?;

        Ok(sports
            .into_iter()
            .map(|s| League {
                key: s.key,
                title: s.title,
                active: s.active,
            })
            .collect())
    }

    /// Check how many API requests you have remaining
    pub async fn check_usage(&self) -> Result<ApiUsage> {
        let url = format!("{}/sports", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let usage = ApiUsage {
            remaining: header("x-requests-remaining"),
            used: header("x-requests-used"),
        };

        info!(remaining = ?usage.remaining, used = ?usage.used, "Odds API usage");
        Ok(usage)
    }
}
