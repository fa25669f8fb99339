use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use smart_betting::accounts::AccountManager;
use smart_betting::analysis_api::{request_analysis, AnalysisClient};
use smart_betting::config::Config;
use smart_betting::data::{write_history_csv, AccountStore};
use smart_betting::ledger::LedgerError;
use smart_betting::market_snapshot::SIMULATION_LEAGUE_KEY;
use smart_betting::odds_calculator::{format_for_display, implied_probability, WagerQuote};
use smart_betting::{analysis_client, Account, MarketFeed, Matchup, OddsFormat, Settlement, WagerRecord};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;

const DEFAULT_STAKE: f64 = 50.0;

// Custom filters for formatting
mod filters {
    pub fn format_money(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.2}", value))
    }

    pub fn format_signed_money(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:+.2}", value))
    }

    pub fn format_percent(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.1}%", value * 100.0))
    }
}

struct LeagueOption {
    key: String,
    title: String,
    selected: bool,
}

struct QuoteView {
    participant: String,
    odds_display: String,
    implied_probability: f64,
    profit: f64,
    total_payout: f64,
}

#[derive(Default)]
struct MatchupView {
    id: String,
    title: String,
    selected: bool,
    quotes: Vec<QuoteView>,
}

struct WagerRow {
    id: u64,
    match_title: String,
    selection: String,
    odds_display: String,
    stake: f64,
    total_payout: f64,
    result: String,
    pending: bool,
}

#[derive(Template)]
#[template(path = "board.html")]
struct BoardTemplate {
    active_page: String,
    user_id: String,
    bankroll: f64,
    net_pnl: f64,
    roi: f64,
    pnl_positive: bool,
    message: String,
    has_message: bool,
    leagues: Vec<LeagueOption>,
    league_key: String,
    odds_format: String,
    stake: f64,
    matchups: Vec<MatchupView>,
    has_slip: bool,
    slip: MatchupView,
    pending: Vec<WagerRow>,
    history: Vec<WagerRow>,
}

#[derive(Template)]
#[template(path = "analysis.html")]
struct AnalysisTemplate {
    active_page: String,
    league_key: String,
    odds_format: String,
    match_title: String,
    selection: String,
    odds_display: String,
    implied_probability: f64,
    analysis: String,
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

struct AppState {
    feed: MarketFeed,
    accounts: AccountManager,
    analysis: Option<AnalysisClient>,
    user_id: String,
}

// Shared state across requests
type SharedState = Arc<AppState>;

#[derive(Debug, Deserialize)]
struct BoardQuery {
    league: Option<String>,
    matchup: Option<String>,
    format: Option<String>,
    stake: Option<String>,
    msg: Option<String>,
}

/// Board view a form was posted from, carried back on the redirect
#[derive(Debug, Default, Deserialize)]
struct BoardLink {
    #[serde(default)]
    league: String,
    #[serde(default)]
    matchup: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    stake: String,
}

impl BoardLink {
    fn url(&self, message: &str) -> String {
        let league = if self.league.is_empty() {
            SIMULATION_LEAGUE_KEY
        } else {
            &self.league
        };

        let mut url = format!("/?league={}", urlencoding::encode(league));
        for (name, value) in [
            ("matchup", &self.matchup),
            ("format", &self.format),
            ("stake", &self.stake),
        ] {
            if !value.is_empty() {
                url.push_str(&format!("&{}={}", name, urlencoding::encode(value)));
            }
        }
        url.push_str(&format!("&msg={}", urlencoding::encode(message)));
        url
    }
}

#[derive(Debug, Deserialize)]
struct PlaceBetForm {
    league: String,
    matchup_id: String,
    participant: String,
    stake: String,
    #[serde(default)]
    format: String,
}

impl PlaceBetForm {
    fn link(&self) -> BoardLink {
        BoardLink {
            league: self.league.clone(),
            matchup: self.matchup_id.clone(),
            format: self.format.clone(),
            stake: self.stake.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SettleForm {
    outcome: String,
    #[serde(default)]
    league: String,
    #[serde(default)]
    matchup: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    stake: String,
}

impl SettleForm {
    fn link(&self) -> BoardLink {
        BoardLink {
            league: self.league.clone(),
            matchup: self.matchup.clone(),
            format: self.format.clone(),
            stake: self.stake.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisForm {
    league: String,
    matchup_id: String,
    participant: String,
    #[serde(default)]
    format: String,
}

impl AnalysisForm {
    fn link(&self) -> BoardLink {
        BoardLink {
            league: self.league.clone(),
            matchup: self.matchup_id.clone(),
            format: self.format.clone(),
            stake: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuoteQuery {
    odds: String,
    stake: Option<String>,
    format: Option<String>,
}

fn parse_stake(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s > 0.0)
}

fn matchup_view(matchup: &Matchup, selected: bool, stake: f64, format: OddsFormat) -> MatchupView {
    MatchupView {
        id: matchup.id.clone(),
        title: matchup.title.clone(),
        selected,
        quotes: matchup
            .odds
            .iter()
            .map(|o| {
                let quote = WagerQuote::new(stake, o.price, format);
                QuoteView {
                    participant: o.team.clone(),
                    odds_display: quote.odds_display,
                    implied_probability: quote.implied_probability,
                    profit: quote.profit,
                    total_payout: quote.total_payout,
                }
            })
            .collect(),
    }
}

fn wager_row(wager: &WagerRecord, format: OddsFormat) -> WagerRow {
    WagerRow {
        id: wager.id,
        match_title: wager.match_title.clone(),
        selection: wager.selection.clone(),
        odds_display: format_for_display(wager.odds, format),
        stake: wager.stake,
        total_payout: wager.total_payout,
        result: wager.result.to_string(),
        pending: wager.is_pending(),
    }
}

fn ledger_message(err: &LedgerError) -> String {
    match err {
        LedgerError::InsufficientFunds { .. } => "Insufficient Funds".to_string(),
        LedgerError::Storage(_) => "Account storage is unavailable, try again".to_string(),
        other => other.to_string(),
    }
}

fn parse_format(raw: Option<&str>) -> OddsFormat {
    raw.and_then(|f| f.parse().ok()).unwrap_or_default()
}

/// Quoted odds for a pick, or the message explaining why there are none
fn pick_odds(matchup: &Matchup, participant: &str) -> Result<f64, &'static str> {
    if !matchup.has_participant(participant) {
        return Err("Pick a participant from the matchup");
    }
    matchup
        .odds_for(participant)
        .ok_or("Odds for that pick are unavailable")
}

async fn board(State(state): State<SharedState>, Query(q): Query<BoardQuery>) -> impl IntoResponse {
    let format = parse_format(q.format.as_deref());
    let stake = parse_stake(q.stake.as_deref()).unwrap_or(DEFAULT_STAKE);
    let league_key = q
        .league
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| SIMULATION_LEAGUE_KEY.to_string());

    let leagues = state
        .feed
        .leagues()
        .await
        .into_iter()
        .map(|l| LeagueOption {
            selected: l.key == league_key,
            key: l.key,
            title: l.title,
        })
        .collect();

    let matchups = state.feed.matchups(&league_key).await;
    let selected_id = q
        .matchup
        .or_else(|| matchups.first().map(|m| m.id.clone()))
        .unwrap_or_default();

    let slip = matchups
        .iter()
        .find(|m| m.id == selected_id)
        .map(|m| matchup_view(m, true, stake, format));
    let matchups = matchups
        .iter()
        .map(|m| matchup_view(m, m.id == selected_id, stake, format))
        .collect();

    let account: Account = state.accounts.account(&state.user_id).await;
    let message = q.msg.unwrap_or_default();

    let template = BoardTemplate {
        active_page: "board".to_string(),
        user_id: account.user_id.clone(),
        bankroll: account.bankroll,
        net_pnl: account.net_pnl(),
        roi: account.roi_percent() / 100.0,
        pnl_positive: account.net_pnl() >= 0.0,
        has_message: !message.is_empty(),
        message,
        leagues,
        league_key,
        odds_format: format.to_string(),
        stake,
        matchups,
        has_slip: slip.is_some(),
        slip: slip.unwrap_or_default(),
        pending: account.pending().into_iter().map(|w| wager_row(w, format)).collect(),
        history: account.history().into_iter().map(|w| wager_row(w, format)).collect(),
    };

    HtmlTemplate(template)
}

async fn place_bet(State(state): State<SharedState>, Form(form): Form<PlaceBetForm>) -> Redirect {
    let link = form.link();
    let Some(stake) = parse_stake(Some(&form.stake)) else {
        return Redirect::to(&link.url("Enter a stake greater than zero"));
    };

    let Some(matchup) = state.feed.find_matchup(&form.league, &form.matchup_id).await else {
        return Redirect::to(&link.url("That matchup is no longer on the board"));
    };

    let odds = match pick_odds(&matchup, &form.participant) {
        Ok(odds) => odds,
        Err(problem) => return Redirect::to(&link.url(problem)),
    };

    let message = match state
        .accounts
        .place_wager(&state.user_id, &matchup, &form.participant, odds, stake)
        .await
    {
        Ok(_) => "Bet Placed & Saved!".to_string(),
        Err(e) => ledger_message(&e),
    };

    Redirect::to(&link.url(&message))
}

async fn settle_bet(
    State(state): State<SharedState>,
    Path(wager_id): Path<u64>,
    Form(form): Form<SettleForm>,
) -> Redirect {
    let link = form.link();
    let outcome: Settlement = match form.outcome.parse() {
        Ok(o) => o,
        Err(e) => return Redirect::to(&link.url(&e.to_string())),
    };

    let message = match state.accounts.settle(&state.user_id, wager_id, outcome).await {
        Ok(w) if outcome == Settlement::Win => {
            format!("Result Simulated: WIN (+${:.2})", w.total_payout)
        }
        Ok(_) => "Result Simulated: LOSS".to_string(),
        Err(e) => ledger_message(&e),
    };

    Redirect::to(&link.url(&message))
}

async fn reset_account(State(state): State<SharedState>, Form(link): Form<BoardLink>) -> Redirect {
    let message = match state.accounts.reset(&state.user_id).await {
        Ok(account) => format!("Bankroll reset to ${:.2}", account.bankroll),
        Err(e) => ledger_message(&e),
    };
    Redirect::to(&link.url(&message))
}

async fn analysis(State(state): State<SharedState>, Form(form): Form<AnalysisForm>) -> Response {
    let link = form.link();
    let Some(matchup) = state.feed.find_matchup(&form.league, &form.matchup_id).await else {
        return Redirect::to(&link.url("That matchup is no longer on the board")).into_response();
    };
    let odds = match pick_odds(&matchup, &form.participant) {
        Ok(odds) => odds,
        Err(problem) => return Redirect::to(&link.url(problem)).into_response(),
    };
    let format = parse_format(Some(&form.format));

    let text = request_analysis(state.analysis.as_ref(), &matchup.title, &form.participant, odds).await;

    HtmlTemplate(AnalysisTemplate {
        active_page: "analysis".to_string(),
        league_key: form.league,
        odds_format: format.to_string(),
        match_title: matchup.title,
        selection: form.participant,
        odds_display: format_for_display(odds, format),
        implied_probability: implied_probability(odds),
        analysis: text,
    })
    .into_response()
}

async fn history_csv(State(state): State<SharedState>) -> Response {
    let account = state.accounts.account(&state.user_id).await;
    let mut out = Vec::new();
    match write_history_csv(&account.history(), &mut out) {
        Ok(()) => ([(header::CONTENT_TYPE, "text/csv")], out).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn api_leagues(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.feed.leagues().await)
}

async fn api_matchups(State(state): State<SharedState>, Path(league): Path<String>) -> impl IntoResponse {
    Json(state.feed.matchups(&league).await)
}

async fn api_account(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.accounts.account(&state.user_id).await)
}

async fn api_quote(Query(q): Query<QuoteQuery>) -> impl IntoResponse {
    let stake = parse_stake(q.stake.as_deref()).unwrap_or(DEFAULT_STAKE);
    let format = parse_format(q.format.as_deref());
    Json(WagerQuote::new(stake, q.odds.as_str(), format))
}

fn app(state: SharedState) -> Router {
    Router::new()
        // This will serve files from the "static" directory at the "/static" URL path
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(board))
        .route("/bets", post(place_bet))
        .route("/bets/:id/settle", post(settle_bet))
        .route("/account/reset", post(reset_account))
        .route("/analysis", post(analysis))
        .route("/history.csv", get(history_csv))
        .route("/api/leagues", get(api_leagues))
        .route("/api/matchups/:league", get(api_matchups))
        .route("/api/quote", get(api_quote))
        .route("/api/account", get(api_account))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt::init();

    let state = Arc::new(AppState {
        feed: MarketFeed::from_config(&cfg)?,
        accounts: AccountManager::new(AccountStore::new(&cfg.data_dir)),
        analysis: analysis_client(&cfg),
        user_id: cfg.default_user_id.clone(),
    });

    info!(
        user = %state.user_id,
        odds_provider = state.feed.has_provider(),
        analysis = state.analysis.is_some(),
        data_dir = %cfg.data_dir.display(),
        "Starting SmartBetting"
    );

    println!("\nStarting web server at http://{}", cfg.bind_addr);
    println!("Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(name: &str) -> (SharedState, std::path::PathBuf) {
        let mut dir = std::env::temp_dir();
        dir.push(format!("smart_betting_web_{}_{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let state = Arc::new(AppState {
            feed: MarketFeed::new(None, Duration::from_secs(300)),
            accounts: AccountManager::new(AccountStore::new(&dir)),
            analysis: None,
            user_id: "web_tester".to_string(),
        });
        (state, dir)
    }

    fn form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_board_renders_simulation() {
        let (state, dir) = test_state("board");
        let response = app(state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Simulation League"));
        assert!(html.contains("The Bug @ Python Script"));
        assert!(html.contains("-150"));
        assert!(html.contains("+130"));
        assert!(html.contains("1000.00"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_place_and_settle_flow() {
        let (state, dir) = test_state("flow");

        let response = app(state.clone())
            .oneshot(form(
                "/bets",
                "league=sim_league&matchup_id=sim_game_001&participant=Python+Script&stake=50",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let account = state.accounts.account("web_tester").await;
        assert!((account.bankroll - 950.0).abs() < 1e-9);
        let wager_id = account.wagers[0].id;

        let response = app(state.clone())
            .oneshot(form(
                &format!("/bets/{}/settle", wager_id),
                "outcome=WIN&league=sim_league",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!((state.accounts.account("web_tester").await.bankroll - 1033.33).abs() < 0.01);

        // Second settlement is refused and pays nothing
        app(state.clone())
            .oneshot(form(
                &format!("/bets/{}/settle", wager_id),
                "outcome=WIN&league=sim_league",
            ))
            .await
            .unwrap();
        assert!((state.accounts.account("web_tester").await.bankroll - 1033.33).abs() < 0.01);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_insufficient_funds_redirects_with_message() {
        let (state, dir) = test_state("funds");
        let response = app(state.clone())
            .oneshot(form(
                "/bets",
                "league=sim_league&matchup_id=sim_game_001&participant=The+Bug&stake=5000",
            ))
            .await
            .unwrap();

        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.contains("Insufficient%20Funds"));

        let account = state.accounts.account("web_tester").await;
        assert_eq!(account.bankroll, 1000.0);
        assert!(account.wagers.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_redirects_keep_board_view() {
        let (state, dir) = test_state("keep_view");

        let response = app(state.clone())
            .oneshot(form(
                "/bets",
                "league=sim_league&matchup_id=sim_game_001&participant=The+Bug&stake=25&format=Decimal",
            ))
            .await
            .unwrap();
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.contains("format=Decimal"));
        assert!(location.contains("matchup=sim_game_001"));
        assert!(location.contains("stake=25"));

        let wager_id = state.accounts.account("web_tester").await.wagers[0].id;
        let response = app(state.clone())
            .oneshot(form(
                &format!("/bets/{}/settle", wager_id),
                "outcome=LOSS&league=sim_league&matchup=sim_game_001&format=Decimal&stake=25.00",
            ))
            .await
            .unwrap();
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.contains("format=Decimal"));
        assert!(location.contains("stake=25.00"));

        let response = app(state)
            .oneshot(form("/account/reset", "league=sim_league&format=Decimal"))
            .await
            .unwrap();
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with("/?league=sim_league&format=Decimal&msg="));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_pick_odds_messages() {
        let matchup = Matchup::new(
            "m1",
            "Home",
            "Away",
            vec![
                smart_betting::MoneylineOdds { team: "Home".to_string(), price: Some(-120.0) },
                smart_betting::MoneylineOdds { team: "Away".to_string(), price: None },
            ],
        );
        assert_eq!(pick_odds(&matchup, "Home"), Ok(-120.0));
        assert_eq!(pick_odds(&matchup, "Away"), Err("Odds for that pick are unavailable"));
        assert_eq!(pick_odds(&matchup, "Nobody"), Err("Pick a participant from the matchup"));
    }

    #[tokio::test]
    async fn test_analysis_without_key() {
        let (state, dir) = test_state("analysis");
        let response = app(state)
            .oneshot(form(
                "/analysis",
                "league=sim_league&matchup_id=sim_game_001&participant=The+Bug",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("AI Configuration missing."));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_quote_endpoint_is_lenient() {
        let (state, dir) = test_state("quote");
        let response = app(state)
            .oneshot(Request::get("/api/quote?odds=bad&stake=10").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["odds_display"], "N/A");
        assert_eq!(json["implied_probability"], 0.5);
        assert_eq!(json["total_payout"], 10.0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_reset_and_history_csv() {
        let (state, dir) = test_state("reset_csv");
        app(state.clone())
            .oneshot(form(
                "/bets",
                "league=sim_league&matchup_id=sim_game_001&participant=The+Bug&stake=100",
            ))
            .await
            .unwrap();
        app(state.clone())
            .oneshot(form("/account/reset", "league=sim_league"))
            .await
            .unwrap();

        let account = state.accounts.account("web_tester").await;
        assert_eq!(account.bankroll, 1000.0);
        assert_eq!(account.wagers.len(), 1);

        let response = app(state)
            .oneshot(Request::get("/history.csv").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let csv = body_text(response).await;
        assert!(csv.contains("The Bug @ Python Script"));
        assert!(csv.contains("PENDING"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
