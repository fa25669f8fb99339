//! Turns odds-feed events into the uniform [`Matchup`] board.
//!
//! Which quote represents an event is a [`QuoteSelector`] decision. The
//! default, [`FirstQuote`], takes the first bookmaker's first market as-is;
//! there is no best-price shopping across books.

use crate::api::odds_api::{OddsApiEvent, OddsApiOutcome};
use crate::models::{League, Matchup, MoneylineOdds};
use crate::utils::odds_calculator::AmericanOdds;

pub const SIMULATION_LEAGUE_KEY: &str = "sim_league";
pub const SIMULATION_LEAGUE_TITLE: &str = "Simulation League";

/// Leagues listed even when the provider marks them inactive
pub const POPULAR_LEAGUES: [&str; 4] = [
    "basketball_nba",
    "americanfootball_nfl",
    "hockey_nhl",
    "soccer_epl",
];

/// Picks the outcome list that stands for an event's odds
pub trait QuoteSelector: Send + Sync {
    fn select<'a>(&self, event: &'a OddsApiEvent) -> Option<&'a [OddsApiOutcome]>;
}

/// First bookmaker, first market
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstQuote;

impl QuoteSelector for FirstQuote {
    fn select<'a>(&self, event: &'a OddsApiEvent) -> Option<&'a [OddsApiOutcome]> {
        let bookmaker = event.bookmakers.as_ref()?.first()?;
        bookmaker.markets.first().map(|m| m.outcomes.as_slice())
    }
}

/// A specific bookmaker's moneyline market, e.g. `BookmakerQuote::new("draftkings")`
#[derive(Debug, Clone)]
pub struct BookmakerQuote {
    bookmaker: String,
}

impl BookmakerQuote {
    pub fn new(bookmaker: &str) -> Self {
        Self {
            bookmaker: bookmaker.to_string(),
        }
    }
}

impl QuoteSelector for BookmakerQuote {
    fn select<'a>(&self, event: &'a OddsApiEvent) -> Option<&'a [OddsApiOutcome]> {
        let bookmaker = event
            .bookmakers
            .as_ref()?
            .iter()
            .find(|b| b.key == self.bookmaker)?;
        bookmaker
            .markets
            .iter()
            .find(|m| m.key == "h2h")
            .map(|m| m.outcomes.as_slice())
    }
}

/// Build matchups from feed events. Events without a usable quote are dropped;
/// an unreadable price only blanks that one participant's odds.
pub fn build_matchups(events: &[OddsApiEvent], selector: &dyn QuoteSelector) -> Vec<Matchup> {
    events
        .iter()
        .filter_map(|event| {
            let outcomes = selector.select(event).filter(|o| !o.is_empty())?;

            let odds = outcomes
                .iter()
                .map(|outcome| MoneylineOdds {
                    team: outcome.name.clone(),
                    price: outcome.price.american(),
                })
                .collect();

            Some(Matchup::new(
                &event.id,
                &event.home_team,
                &event.away_team,
                odds,
            ))
        })
        .collect()
}

pub fn simulation_league() -> League {
    League {
        key: SIMULATION_LEAGUE_KEY.to_string(),
        title: SIMULATION_LEAGUE_TITLE.to_string(),
        active: true,
    }
}

/// Fixed matchup so the board works without connectivity or an API key
pub fn simulation_matchups() -> Vec<Matchup> {
    vec![Matchup::new(
        "sim_game_001",
        "Python Script",
        "The Bug",
        vec![
            MoneylineOdds {
                team: "Python Script".to_string(),
                price: Some(-150.0),
            },
            MoneylineOdds {
                team: "The Bug".to_string(),
                price: Some(130.0),
            },
        ],
    )]
}

/// Active or popular provider leagues, with the simulation league always first
pub fn build_league_list(provider_leagues: Vec<League>) -> Vec<League> {
    let mut leagues = vec![simulation_league()];
    leagues.extend(
        provider_leagues
            .into_iter()
            .filter(|l| l.active || POPULAR_LEAGUES.contains(&l.key.as_str())),
    );
    leagues
}

pub fn is_simulation(league_key: &str) -> bool {
    league_key == SIMULATION_LEAGUE_KEY
}
