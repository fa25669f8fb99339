//! Account-scoped access to the ledger.
//!
//! Each mutating call holds that account's lock across load → apply → save,
//! so two requests for the same user can't both pass the balance check or
//! both settle the same wager. The ledger rule runs on a copy and the copy
//! is only returned once it has been written.

use crate::models::{Account, Matchup, Settlement, WagerRecord};
use crate::utils::data::AccountStore;
use crate::utils::ledger::{self, LedgerError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct AccountManager {
    store: AccountStore,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountManager {
    pub fn new(store: AccountStore) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock for one account. Entries nobody else holds are dropped on the way
    /// in, so the map only tracks accounts with work in flight.
    fn lock_for(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|user, lock| user == user_id || Arc::strong_count(lock) > 1);
        locks.entry(user_id.to_string()).or_default().clone()
    }

    /// Current account state for display. Never fails: a first visit creates
    /// the account, and an unreadable store falls back to a fresh bankroll.
    pub async fn account(&self, user_id: &str) -> Account {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        match self.store.load(user_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                let account = Account::new(user_id);
                if let Err(e) = self.store.save(&account).await {
                    warn!(user = user_id, error = %e, "Could not persist new account");
                }
                account
            }
            Err(e) => {
                warn!(user = user_id, error = %e, "Account store unavailable, using starting bankroll");
                Account::new(user_id)
            }
        }
    }

    /// Run a ledger rule against the stored account and persist the result
    async fn apply<T>(
        &self,
        user_id: &str,
        rule: impl FnOnce(&mut Account) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut account = self
            .store
            .load(user_id)
            .await?
            .unwrap_or_else(|| Account::new(user_id));

        let out = rule(&mut account)?;
        self.store.save(&account).await?;
        Ok(out)
    }

    pub async fn place_wager(
        &self,
        user_id: &str,
        matchup: &Matchup,
        participant: &str,
        odds: f64,
        stake: f64,
    ) -> Result<WagerRecord, LedgerError> {
        let record = self
            .apply(user_id, |account| {
                ledger::place_wager(account, matchup, participant, odds, stake)
            })
            .await?;

        info!(
            user = user_id,
            wager = record.id,
            matchup = %record.match_title,
            pick = %record.selection,
            stake = record.stake,
            payout = record.total_payout,
            "Wager placed"
        );
        Ok(record)
    }

    pub async fn settle(
        &self,
        user_id: &str,
        wager_id: u64,
        outcome: Settlement,
    ) -> Result<WagerRecord, LedgerError> {
        let record = self
            .apply(user_id, |account| ledger::settle(account, wager_id, outcome))
            .await?;

        info!(user = user_id, wager = record.id, result = %record.result, "Wager settled");
        Ok(record)
    }

    /// Settle whichever pending wager was placed last
    pub async fn settle_latest(
        &self,
        user_id: &str,
        outcome: Settlement,
    ) -> Result<Option<WagerRecord>, LedgerError> {
        let record = self
            .apply(user_id, |account| {
                match ledger::latest_pending(account).map(|w| w.id) {
                    Some(id) => ledger::settle(account, id, outcome).map(Some),
                    None => Ok(None),
                }
            })
            .await?;

        if let Some(r) = &record {
            info!(user = user_id, wager = r.id, result = %r.result, "Latest wager settled");
        }
        Ok(record)
    }

    /// Restore the starting bankroll. An unreadable document is moved aside
    /// and replaced with a fresh account instead of blocking the reset.
    pub async fn reset(&self, user_id: &str) -> Result<Account, LedgerError> {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock().await;

        let mut account = match self.store.load(user_id).await {
            Ok(found) => found.unwrap_or_else(|| Account::new(user_id)),
            Err(e) => {
                let kept = self.store.set_aside(user_id).await?;
                warn!(
                    user = user_id,
                    error = %e,
                    kept = %kept.display(),
                    "Unreadable account document moved aside"
                );
                Account::new(user_id)
            }
        };

        ledger::reset_account(&mut account);
        self.store.save(&account).await?;

        info!(user = user_id, bankroll = account.bankroll, "Account reset");
        Ok(account)
    }
}
