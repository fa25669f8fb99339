pub mod accounts;
pub mod data;
pub mod ledger;
pub mod market_snapshot;
pub mod odds_cache;
pub mod odds_calculator;
