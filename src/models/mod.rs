use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bankroll every account starts with (and returns to on reset)
pub const INITIAL_BANKROLL: f64 = 1000.00;

/// The only wager type the board offers
pub const MONEYLINE: &str = "Moneyline";

/// A league the board can be switched to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct League {
    pub key: String,
    pub title: String,
    pub active: bool,
}

/// Moneyline odds for a team
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoneylineOdds {
    pub team: String,
    pub price: Option<f64>, // American odds (e.g., -110, +150); None when the feed's price is unreadable
}

/// A head-to-head matchup with one quote per participant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Matchup {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub title: String,
    pub odds: Vec<MoneylineOdds>,
}

impl Matchup {
    pub fn new(id: &str, home_team: &str, away_team: &str, odds: Vec<MoneylineOdds>) -> Self {
        Self {
            id: id.to_string(),
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            title: format!("{} @ {}", away_team, home_team),
            odds,
        }
    }

    /// Quoted price for a participant, if the matchup lists one with readable odds
    pub fn odds_for(&self, participant: &str) -> Option<f64> {
        self.odds
            .iter()
            .find(|o| o.team == participant)
            .and_then(|o| o.price)
    }

    pub fn has_participant(&self, participant: &str) -> bool {
        self.odds.iter().any(|o| o.team == participant)
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.odds.iter().map(|o| o.team.as_str())
    }
}

/// How odds are rendered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OddsFormat {
    #[default]
    American,
    Decimal,
}

impl fmt::Display for OddsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OddsFormat::American => write!(f, "American"),
            OddsFormat::Decimal => write!(f, "Decimal"),
        }
    }
}

impl FromStr for OddsFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "american" => Ok(OddsFormat::American),
            "decimal" => Ok(OddsFormat::Decimal),
            other => anyhow::bail!("Unknown odds format: {}", other),
        }
    }
}

/// Lifecycle state of a wager. PENDING is the only creation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WagerResult {
    Pending,
    Win,
    Loss,
}

impl fmt::Display for WagerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerResult::Pending => write!(f, "PENDING"),
            WagerResult::Win => write!(f, "WIN"),
            WagerResult::Loss => write!(f, "LOSS"),
        }
    }
}

/// Outcome an operator can settle a pending wager to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settlement {
    Win,
    Loss,
}

impl From<Settlement> for WagerResult {
    fn from(s: Settlement) -> Self {
        match s {
            Settlement::Win => WagerResult::Win,
            Settlement::Loss => WagerResult::Loss,
        }
    }
}

impl FromStr for Settlement {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "win" => Ok(Settlement::Win),
            "loss" => Ok(Settlement::Loss),
            other => anyhow::bail!("Unknown settlement outcome: {}", other),
        }
    }
}

/// A placed wager. Only `result` changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WagerRecord {
    pub id: u64,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    #[serde(rename = "game_id")]
    pub matchup_id: String,
    #[serde(rename = "match")]
    pub match_title: String,
    #[serde(rename = "pick")]
    pub selection: String,
    #[serde(rename = "type")]
    pub wager_type: String,
    pub odds: f64,
    pub stake: f64,
    #[serde(rename = "potential_payout")]
    pub total_payout: f64,
    pub result: WagerResult,
    pub timestamp: DateTime<Utc>,
}

impl WagerRecord {
    pub fn is_pending(&self) -> bool {
        self.result == WagerResult::Pending
    }

    /// Winnings on top of the returned stake
    pub fn potential_profit(&self) -> f64 {
        self.total_payout - self.stake
    }
}

/// A user's bankroll together with every wager they have placed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    #[serde(default)]
    pub user_id: String,
    pub bankroll: f64,
    #[serde(default)]
    pub wagers: Vec<WagerRecord>,
}

impl Account {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            bankroll: INITIAL_BANKROLL,
            wagers: Vec::new(),
        }
    }

    /// All wagers, newest first
    pub fn history(&self) -> Vec<&WagerRecord> {
        let mut wagers: Vec<&WagerRecord> = self.wagers.iter().collect();
        wagers.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        wagers
    }

    /// Pending wagers, newest first
    pub fn pending(&self) -> Vec<&WagerRecord> {
        self.history().into_iter().filter(|w| w.is_pending()).collect()
    }

    pub fn net_pnl(&self) -> f64 {
        self.bankroll - INITIAL_BANKROLL
    }

    pub fn roi_percent(&self) -> f64 {
        self.net_pnl() / INITIAL_BANKROLL * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn wager(id: u64, minutes_ago: i64, result: WagerResult) -> WagerRecord {
        WagerRecord {
            id,
            owner_id: "tester".to_string(),
            matchup_id: "g1".to_string(),
            match_title: "A @ B".to_string(),
            selection: "A".to_string(),
            wager_type: MONEYLINE.to_string(),
            odds: 120.0,
            stake: 10.0,
            total_payout: 22.0,
            result,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn test_matchup_title_and_lookup() {
        let m = Matchup::new(
            "g1",
            "Home",
            "Away",
            vec![
                MoneylineOdds { team: "Home".to_string(), price: Some(-150.0) },
                MoneylineOdds { team: "Away".to_string(), price: Some(130.0) },
                MoneylineOdds { team: "Field".to_string(), price: None },
            ],
        );
        assert_eq!(m.title, "Away @ Home");
        assert_eq!(m.odds_for("Away"), Some(130.0));
        assert_eq!(m.odds_for("Nobody"), None);
        assert_eq!(m.odds_for("Field"), None);
        assert!(m.has_participant("Field"));
        assert!(!m.has_participant("Nobody"));
        assert_eq!(m.participants().collect::<Vec<_>>(), vec!["Home", "Away", "Field"]);
    }

    #[test]
    fn test_history_newest_first() {
        let mut account = Account::new("tester");
        account.wagers.push(wager(1, 30, WagerResult::Win));
        account.wagers.push(wager(2, 5, WagerResult::Pending));
        account.wagers.push(wager(3, 10, WagerResult::Pending));

        let ids: Vec<u64> = account.history().iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let pending: Vec<u64> = account.pending().iter().map(|w| w.id).collect();
        assert_eq!(pending, vec![2, 3]);
    }

    #[test]
    fn test_wager_document_field_names() {
        let json = serde_json::to_value(wager(7, 0, WagerResult::Pending)).unwrap();
        for field in [
            "user_id",
            "game_id",
            "match",
            "pick",
            "type",
            "odds",
            "stake",
            "potential_payout",
            "result",
            "timestamp",
        ] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(json["result"], "PENDING");
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Decimal".parse::<OddsFormat>().unwrap(), OddsFormat::Decimal);
        assert_eq!("american".parse::<OddsFormat>().unwrap(), OddsFormat::American);
        assert!("fractional".parse::<OddsFormat>().is_err());
        assert_eq!("WIN".parse::<Settlement>().unwrap(), Settlement::Win);
        assert_eq!("loss".parse::<Settlement>().unwrap(), Settlement::Loss);
        assert!("pending".parse::<Settlement>().is_err());
    }

    #[test]
    fn test_roi() {
        let mut account = Account::new("tester");
        account.bankroll = 1100.0;
        assert!((account.net_pnl() - 100.0).abs() < 1e-9);
        assert!((account.roi_percent() - 10.0).abs() < 1e-9);
    }
}
