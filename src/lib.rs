pub mod api;
pub mod config;
pub mod models;
pub mod utils;

pub use api::*;
pub use models::*;
pub use utils::*;

use anyhow::Result;
use api::analysis_api::AnalysisClient;
use api::odds_api::{OddsApiClient, OddsApiEvent};
use config::Config;
use utils::market_snapshot::{
    build_league_list, build_matchups, is_simulation, simulation_matchups, FirstQuote,
    QuoteSelector,
};
use utils::odds_cache::OddsCache;
use tracing::{info, warn};

const LEAGUES_CACHE_KEY: &str = "__leagues__";

/// Everything the board needs to list leagues and matchups.
///
/// Provider failures (no key, network errors, non-200s) never escape: they
/// are logged and treated as "no data", leaving the simulation league.
pub struct MarketFeed {
    odds_client: Option<OddsApiClient>,
    events: OddsCache<Vec<OddsApiEvent>>,
    leagues: OddsCache<Vec<League>>,
    selector: Box<dyn QuoteSelector>,
}

impl MarketFeed {
    pub fn new(odds_client: Option<OddsApiClient>, ttl: std::time::Duration) -> Self {
        Self {
            odds_client,
            events: OddsCache::new(ttl),
            leagues: OddsCache::new(ttl),
            selector: Box::new(FirstQuote),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let odds_client = match &cfg.odds_api_key {
            Some(key) => Some(OddsApiClient::with_base_url(key.clone(), &cfg.odds_api_base_url)?),
            None => {
                info!("ODDS_API_KEY not set, only the simulation league is available");
                None
            }
        };
        Ok(Self::new(odds_client, cfg.odds_cache_ttl))
    }

    /// Swap the quote selection strategy (default: first bookmaker, first market)
    pub fn with_selector(mut self, selector: impl QuoteSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    pub fn has_provider(&self) -> bool {
        self.odds_client.is_some()
    }

    pub fn odds_client(&self) -> Option<&OddsApiClient> {
        self.odds_client.as_ref()
    }

    /// Leagues to offer, simulation league first
    pub async fn leagues(&self) -> Vec<League> {
        let Some(client) = &self.odds_client else {
            return build_league_list(Vec::new());
        };

        if let Some(cached) = self.leagues.get(LEAGUES_CACHE_KEY).await {
            return build_league_list(cached);
        }

        match client.fetch_leagues().await {
            Ok(leagues) => {
                self.leagues.insert(LEAGUES_CACHE_KEY, leagues.clone()).await;
                build_league_list(leagues)
            }
            Err(e) => {
                warn!(error = %e, "Could not list leagues");
                build_league_list(Vec::new())
            }
        }
    }

    /// Matchups for a league; empty when the provider has nothing usable
    pub async fn matchups(&self, league_key: &str) -> Vec<Matchup> {
        if is_simulation(league_key) {
            return simulation_matchups();
        }
        let events = self.events(league_key).await;
        build_matchups(&events, self.selector.as_ref())
    }

    pub async fn find_matchup(&self, league_key: &str, matchup_id: &str) -> Option<Matchup> {
        self.matchups(league_key)
            .await
            .into_iter()
            .find(|m| m.id == matchup_id)
    }

    async fn events(&self, league_key: &str) -> Vec<OddsApiEvent> {
        let Some(client) = &self.odds_client else {
            return Vec::new();
        };

        if let Some(cached) = self.events.get(league_key).await {
            return cached;
        }

        match client.fetch_events(league_key).await {
            Ok(events) => {
                self.events.insert(league_key, events.clone()).await;
                events
            }
            Err(e) => {
                warn!(league = league_key, error = %e, "Odds feed unavailable");
                Vec::new()
            }
        }
    }
}

/// Analysis client when a key is configured
pub fn analysis_client(cfg: &Config) -> Option<AnalysisClient> {
    let key = cfg.analysis_api_key.clone()?;
    match AnalysisClient::new(key, &cfg.analysis_base_url, &cfg.analysis_model) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "Could not build analysis client");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::market_snapshot::SIMULATION_LEAGUE_KEY;
    use std::time::Duration;

    #[tokio::test]
    async fn test_feed_without_key_is_simulation_only() {
        let feed = MarketFeed::new(None, Duration::from_secs(300));
        assert!(!feed.has_provider());

        let leagues = feed.leagues().await;
        assert_eq!(leagues.len(), 1);
        assert_eq!(leagues[0].key, SIMULATION_LEAGUE_KEY);

        assert_eq!(feed.matchups(SIMULATION_LEAGUE_KEY).await.len(), 1);
        assert!(feed.matchups("basketball_nba").await.is_empty());
        assert!(feed
            .find_matchup(SIMULATION_LEAGUE_KEY, "sim_game_001")
            .await
            .is_some());
        assert!(feed.find_matchup(SIMULATION_LEAGUE_KEY, "nope").await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades() {
        let client = OddsApiClient::with_base_url("key".to_string(), "http://127.0.0.1:9").unwrap();
        let feed = MarketFeed::new(Some(client), Duration::from_secs(300));

        let leagues = feed.leagues().await;
        assert_eq!(leagues.len(), 1);
        assert!(feed.matchups("basketball_nba").await.is_empty());
        // Simulation never touches the provider
        assert_eq!(feed.matchups(SIMULATION_LEAGUE_KEY).await.len(), 1);
    }

    #[test]
    fn test_analysis_client_needs_key() {
        let cfg = Config::from_lookup(|_| None).unwrap();
        assert!(analysis_client(&cfg).is_none());

        let cfg = Config::from_lookup(|k| (k == "OPENROUTER_API_KEY").then(|| "k".to_string())).unwrap();
        assert_eq!(analysis_client(&cfg).unwrap().model(), "openai/gpt-4o-mini");
    }
}
