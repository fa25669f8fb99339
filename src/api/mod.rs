pub mod analysis_api;
pub mod odds_api;
