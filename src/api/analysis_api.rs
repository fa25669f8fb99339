//! Value analysis of a wager via OpenRouter's OpenAI-compatible chat
//! completions endpoint.
//!
//! The analysis is advisory text for the user. [`request_analysis`] never
//! fails: a missing key or a failed call becomes a message to show instead.

use crate::models::OddsFormat;
use crate::utils::odds_calculator::{format_for_display, implied_probability};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_ANALYSIS_MODEL: &str = "openai/gpt-4o-mini";

/// Shown when no analysis key is configured
pub const MISSING_CONFIGURATION: &str = "AI Configuration missing.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis provider is not configured")]
    ProviderUnavailable,

    #[error("{0}")]
    ProviderError(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

pub struct AnalysisClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnalysisClient {
    pub fn new(api_key: String, base_url: &str, model: &str) -> Result<Self, AnalysisError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AnalysisError::ProviderError(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The single user-role prompt sent for a wager
    pub fn build_prompt(match_title: &str, selection: &str, odds: f64) -> String {
        format!(
            "You are a sports betting analyst. Assess whether this moneyline wager offers value.\n\
             - Match: {match_title}\n\
             - Selection: {selection}\n\
             - Odds: {odds} (implied probability {prob:.1}%)\n\n\
             Cover recent form and situational factors, say whether the true win \
             probability is likely above or below the implied one, give a verdict of \
             'High Value', 'Marginal Value' or 'Negative Expected Value', and end with \
             one bankroll management tip.",
            odds = format_for_display(odds, OddsFormat::American),
            prob = implied_probability(odds) * 100.0,
        )
    }

    pub async fn request(
        &self,
        match_title: &str,
        selection: &str,
        odds: f64,
    ) -> Result<String, AnalysisError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Self::build_prompt(match_title, selection, odds),
            }],
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, match_title, selection, "Requesting value analysis");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisError::ProviderError(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::ProviderError(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ProviderError(format!("unreadable response: {e}")))?;

        body.choices
            .into_iter()
            .find_map(|c| c.message)
            .map(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AnalysisError::ProviderError("empty response".to_string()))
    }
}

/// Text to show the user for an analysis attempt
pub fn analysis_message(result: Result<String, AnalysisError>) -> String {
    match result {
        Ok(text) => text,
        Err(AnalysisError::ProviderUnavailable) => MISSING_CONFIGURATION.to_string(),
        Err(e) => {
            warn!(error = %e, "Value analysis failed");
            format!("Error: {e}")
        }
    }
}

/// Run a value analysis, degrading every failure to a displayable message
pub async fn request_analysis(
    client: Option<&AnalysisClient>,
    match_title: &str,
    selection: &str,
    odds: f64,
) -> String {
    let result = match client {
        Some(client) => client.request(match_title, selection, odds).await,
        None => Err(AnalysisError::ProviderUnavailable),
    };
    analysis_message(result)
}
