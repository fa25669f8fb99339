use crate::models::{Account, WagerRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// One JSON document per account under a data directory
#[derive(Debug, Clone)]
pub struct AccountStore {
    dir: PathBuf,
}

impl AccountStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn account_path(&self, user_id: &str) -> Result<PathBuf> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            anyhow::bail!("Invalid user id: {:?}", user_id);
        }
        Ok(self.dir.join(format!("{}.json", user_id)))
    }

    /// Load an account document. `None` when the user has never been saved.
    ///
    /// Documents written without a `user_id` (just `{"bankroll": ...}`) are
    /// accepted; the owner always comes from the file name.
    pub async fn load(&self, user_id: &str) -> Result<Option<Account>> {
        let path = self.account_path(user_id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read account file {}", path.display()))
            }
        };

        let mut account: Account = serde_json::from_str(&json)
            .with_context(|| format!("Failed to deserialize account file {}", path.display()))?;
        account.user_id = user_id.to_string();
        Ok(Some(account))
    }

    /// Replace the account document in one step: write and sync a sibling
    /// temp file, then rename it over the old one.
    pub async fn save(&self, account: &Account) -> Result<()> {
        let path = self.account_path(&account.user_id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create data directory")?;

        let json =
            serde_json::to_string_pretty(account).context("Failed to serialize account data")?;
        let tmp = path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .context("Failed to create account file")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write account file")?;
        file.sync_all().await.context("Failed to sync account file")?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .context("Failed to replace account file")?;

        debug!(user = %account.user_id, bankroll = account.bankroll, "Account saved");
        Ok(())
    }

    /// Move an unreadable account document out of the way so a fresh one can
    /// be written. Returns where the old contents were kept.
    pub async fn set_aside(&self, user_id: &str) -> Result<PathBuf> {
        let path = self.account_path(user_id)?;
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let kept = path.with_extension(format!("json.unreadable-{}", stamp));
        tokio::fs::rename(&path, &kept)
            .await
            .with_context(|| format!("Failed to move aside {}", path.display()))?;
        Ok(kept)
    }
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    id: u64,
    #[serde(rename = "match")]
    match_title: &'a str,
    pick: &'a str,
    #[serde(rename = "type")]
    wager_type: &'a str,
    odds: f64,
    stake: f64,
    potential_payout: f64,
    result: String,
    timestamp: String,
}

/// Write wager history as CSV
pub fn write_history_csv<W: Write>(wagers: &[&WagerRecord], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    for wager in wagers {
        csv.serialize(HistoryRow {
            id: wager.id,
            match_title: &wager.match_title,
            pick: &wager.selection,
            wager_type: &wager.wager_type,
            odds: wager.odds,
            stake: wager.stake,
            potential_payout: wager.total_payout,
            result: wager.result.to_string(),
            timestamp: wager.timestamp.to_rfc3339(),
        })
        .context("Failed to write CSV row")?;
    }

    csv.flush().context("Failed to flush CSV")?;
    Ok(())
}

/// Save an account's history (newest first) to a CSV file
pub fn save_history_to_csv(account: &Account, filename: &str) -> Result<()> {
    let file = File::create(filename).context("Failed to create CSV file")?;
    write_history_csv(&account.history(), file)
}
