use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smart_betting::accounts::AccountManager;
use smart_betting::analysis_api::request_analysis;
use smart_betting::config::Config;
use smart_betting::data::{save_history_to_csv, AccountStore};
use smart_betting::market_snapshot::{BookmakerQuote, SIMULATION_LEAGUE_KEY};
use smart_betting::odds_calculator::{format_for_display, WagerQuote};
use smart_betting::{analysis_client, MarketFeed, Matchup, OddsFormat, Settlement};

#[derive(Parser)]
#[command(name = "smart-betting", about = "Odds board and simulated bankroll")]
struct Cli {
    /// Account to act on (defaults to DEFAULT_USER_ID)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Odds display: american or decimal
    #[arg(long, global = true, default_value = "american")]
    format: OddsFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the leagues on offer
    Leagues,
    /// Show matchups and odds for a league
    Board {
        #[arg(long, default_value = SIMULATION_LEAGUE_KEY)]
        league: String,
        /// Quote a specific bookmaker instead of the first one listed
        #[arg(long)]
        bookmaker: Option<String>,
    },
    /// Price a stake at given American odds (e.g. --odds=-150 --stake 50)
    Quote {
        #[arg(long, allow_hyphen_values = true)]
        odds: String,
        #[arg(long, default_value_t = 50.0)]
        stake: f64,
    },
    /// Place a moneyline wager
    Bet {
        #[arg(long, default_value = SIMULATION_LEAGUE_KEY)]
        league: String,
        #[arg(long)]
        matchup: String,
        #[arg(long)]
        pick: String,
        #[arg(long)]
        stake: f64,
    },
    /// Settle a pending wager as WIN or LOSS
    Settle {
        /// Wager id (see `history`)
        #[arg(long, conflicts_with = "latest", required_unless_present = "latest")]
        wager: Option<u64>,
        /// Settle the most recently placed pending wager
        #[arg(long)]
        latest: bool,
        #[arg(long)]
        outcome: Settlement,
    },
    /// Reset the bankroll to the starting amount (history is kept)
    Reset,
    /// Show the account and its wagers
    History {
        /// Also write the history to this CSV file
        #[arg(long)]
        csv: Option<String>,
    },
    /// Ask the analysis model about a wager
    Analyze {
        #[arg(long, default_value = SIMULATION_LEAGUE_KEY)]
        league: String,
        #[arg(long)]
        matchup: String,
        #[arg(long)]
        pick: String,
    },
    /// Check remaining Odds API requests
    Usage,
}

fn pick_odds(matchup: &Matchup, pick: &str) -> Result<f64> {
    if !matchup.has_participant(pick) {
        anyhow::bail!("{} is not part of {}", pick, matchup.title);
    }
    matchup
        .odds_for(pick)
        .with_context(|| format!("Odds for {} are unavailable", pick))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let user = cli.user.unwrap_or_else(|| cfg.default_user_id.clone());
    let format = cli.format;

    let accounts = AccountManager::new(AccountStore::new(&cfg.data_dir));

    match cli.command {
        Command::Leagues => {
            let feed = MarketFeed::from_config(&cfg)?;
            for league in feed.leagues().await {
                println!("{:<32} {}", league.key, league.title);
            }
        }
        Command::Board { league, bookmaker } => {
            let mut feed = MarketFeed::from_config(&cfg)?;
            if let Some(book) = bookmaker {
                feed = feed.with_selector(BookmakerQuote::new(&book));
            }

            let matchups = feed.matchups(&league).await;
            if matchups.is_empty() {
                println!("No matchups with odds for {}.", league);
            }
            for (i, m) in matchups.iter().enumerate() {
                println!("{}. {} [{}]", i + 1, m.title, m.id);
                for o in &m.odds {
                    println!("     {:<28} {}", o.team, format_for_display(o.price, format));
                }
            }
        }
        Command::Quote { odds, stake } => {
            println!("{}", WagerQuote::new(stake, odds.as_str(), format).format());
        }
        Command::Bet {
            league,
            matchup,
            pick,
            stake,
        } => {
            let feed = MarketFeed::from_config(&cfg)?;
            let matchup = feed
                .find_matchup(&league, &matchup)
                .await
                .with_context(|| format!("Matchup {} not found in {}", matchup, league))?;
            let odds = pick_odds(&matchup, &pick)?;

            let wager = accounts
                .place_wager(&user, &matchup, &pick, odds, stake)
                .await?;
            let account = accounts.account(&user).await;

            println!("Bet Placed & Saved!");
            println!(
                "#{} {} on {} at {}: stake ${:.2}, to win ${:.2}, total payout ${:.2}",
                wager.id,
                wager.selection,
                wager.match_title,
                format_for_display(wager.odds, format),
                wager.stake,
                wager.potential_profit(),
                wager.total_payout
            );
            println!("Balance: ${:.2}", account.bankroll);
        }
        Command::Settle {
            wager,
            latest,
            outcome,
        } => {
            let settled = match (wager, latest) {
                (Some(id), _) => Some(accounts.settle(&user, id, outcome).await?),
                (None, _) => accounts.settle_latest(&user, outcome).await?,
            };

            match settled {
                Some(w) => {
                    let account = accounts.account(&user).await;
                    println!("Wager #{} settled: {}", w.id, w.result);
                    println!("Balance: ${:.2}", account.bankroll);
                }
                None => println!("No pending bets to settle."),
            }
        }
        Command::Reset => {
            let account = accounts.reset(&user).await?;
            println!("Bankroll reset to ${:.2}", account.bankroll);
        }
        Command::History { csv } => {
            let account = accounts.account(&user).await;
            println!(
                "{}: balance ${:.2} | Net PnL ${:+.2} | ROI {:.2}%\n",
                account.user_id,
                account.bankroll,
                account.net_pnl(),
                account.roi_percent()
            );

            let history = account.history();
            if history.is_empty() {
                println!("No betting history found.");
            }
            for w in &history {
                println!(
                    "#{:<4} {:<36} {:<20} {:>6} ${:>9.2} ${:>9.2} {}",
                    w.id,
                    w.match_title,
                    w.selection,
                    format_for_display(w.odds, format),
                    w.stake,
                    w.total_payout,
                    w.result
                );
            }

            if let Some(path) = csv {
                save_history_to_csv(&account, &path)?;
                println!("\nSaved history to {}", path);
            }
        }
        Command::Analyze {
            league,
            matchup,
            pick,
        } => {
            let feed = MarketFeed::from_config(&cfg)?;
            let matchup = feed
                .find_matchup(&league, &matchup)
                .await
                .with_context(|| format!("Matchup {} not found in {}", matchup, league))?;
            let odds = pick_odds(&matchup, &pick)?;

            let client = analysis_client(&cfg);
            let text = request_analysis(client.as_ref(), &matchup.title, &pick, odds).await;
            println!("{}", text);
        }
        Command::Usage => {
            let feed = MarketFeed::from_config(&cfg)?;
            match feed.odds_client() {
                Some(client) => {
                    let usage = client.check_usage().await?;
                    println!(
                        "API requests remaining: {}",
                        usage.remaining.as_deref().unwrap_or("unknown")
                    );
                    println!(
                        "API requests used: {}",
                        usage.used.as_deref().unwrap_or("unknown")
                    );
                }
                None => println!("ODDS_API_KEY is not set."),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_settle_latest() {
        let cli = Cli::try_parse_from(["cli", "settle", "--latest", "--outcome", "win"]).unwrap();
        match cli.command {
            Command::Settle { wager, latest, outcome } => {
                assert_eq!(wager, None);
                assert!(latest);
                assert_eq!(outcome, Settlement::Win);
            }
            _ => panic!("expected settle"),
        }

        assert!(Cli::try_parse_from(["cli", "settle", "--outcome", "win"]).is_err());
    }

    #[test]
    fn test_parse_negative_odds_and_format() {
        let cli = Cli::try_parse_from(["cli", "--format", "decimal", "quote", "--odds", "-150"]).unwrap();
        assert_eq!(cli.format, OddsFormat::Decimal);
        match cli.command {
            Command::Quote { odds, stake } => {
                assert_eq!(odds, "-150");
                assert_eq!(stake, 50.0);
            }
            _ => panic!("expected quote"),
        }
    }
}
