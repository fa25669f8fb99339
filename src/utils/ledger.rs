use crate::models::{Account, Matchup, Settlement, WagerRecord, WagerResult, INITIAL_BANKROLL, MONEYLINE};
use crate::utils::odds_calculator::total_payout;
use chrono::Utc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient funds: stake ${stake:.2} exceeds bankroll ${bankroll:.2}")]
    InsufficientFunds { stake: f64, bankroll: f64 },

    #[error("Stake must be a positive amount, got {0}")]
    InvalidStake(f64),

    #[error("Wager {0} not found")]
    NotFound(u64),

    #[error("Wager {id} is already settled ({result})")]
    AlreadySettled { id: u64, result: WagerResult },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

fn next_wager_id(account: &Account) -> u64 {
    account.wagers.iter().map(|w| w.id).max().unwrap_or(0) + 1
}

/// Debit the stake and record a new PENDING moneyline wager.
///
/// Every check runs before the account is touched, so an `Err` leaves the
/// bankroll and the wager list exactly as they were.
pub fn place_wager(
    account: &mut Account,
    matchup: &Matchup,
    participant: &str,
    odds: f64,
    stake: f64,
) -> Result<WagerRecord, LedgerError> {
    if !stake.is_finite() || stake <= 0.0 {
        return Err(LedgerError::InvalidStake(stake));
    }
    if stake > account.bankroll {
        return Err(LedgerError::InsufficientFunds {
            stake,
            bankroll: account.bankroll,
        });
    }

    let record = WagerRecord {
        id: next_wager_id(account),
        owner_id: account.user_id.clone(),
        matchup_id: matchup.id.clone(),
        match_title: matchup.title.clone(),
        selection: participant.to_string(),
        wager_type: MONEYLINE.to_string(),
        odds,
        stake,
        total_payout: total_payout(stake, odds),
        result: WagerResult::Pending,
        timestamp: Utc::now(),
    };

    account.bankroll -= stake;
    account.wagers.push(record.clone());
    Ok(record)
}

/// Resolve a PENDING wager. A win credits the precomputed payout; a loss
/// only closes the wager.
pub fn settle(
    account: &mut Account,
    wager_id: u64,
    outcome: Settlement,
) -> Result<WagerRecord, LedgerError> {
    let wager = account
        .wagers
        .iter_mut()
        .find(|w| w.id == wager_id)
        .ok_or(LedgerError::NotFound(wager_id))?;

    if !wager.is_pending() {
        return Err(LedgerError::AlreadySettled {
            id: wager_id,
            result: wager.result,
        });
    }

    wager.result = outcome.into();
    let settled = wager.clone();

    if outcome == Settlement::Win {
        account.bankroll += settled.total_payout;
    }
    Ok(settled)
}

/// Most recently placed wager that is still open
pub fn latest_pending(account: &Account) -> Option<&WagerRecord> {
    account.pending().into_iter().next()
}

/// Back to the starting bankroll. Wager history is kept.
pub fn reset_account(account: &mut Account) {
    account.bankroll = INITIAL_BANKROLL;
}
