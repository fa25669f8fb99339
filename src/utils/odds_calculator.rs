use crate::models::OddsFormat;
use serde::Serialize;

/// Probability assumed when odds can't be read ("unknown, call it a coin flip")
pub const FALLBACK_PROBABILITY: f64 = 0.5;

/// Rendered in place of odds that can't be read
pub const UNAVAILABLE: &str = "N/A";

/// Anything that might hold American odds: numbers straight from the feed,
/// user-typed strings, raw JSON values.
///
/// Yields `None` for input that doesn't parse, is zero, or isn't finite.
/// Every conversion below degrades on `None` instead of returning an error,
/// so callers always get something renderable.
pub trait AmericanOdds {
    fn american(&self) -> Option<f64>;
}

fn usable(odds: f64) -> Option<f64> {
    (odds.is_finite() && odds != 0.0).then_some(odds)
}

impl AmericanOdds for f64 {
    fn american(&self) -> Option<f64> {
        usable(*self)
    }
}

impl AmericanOdds for i32 {
    fn american(&self) -> Option<f64> {
        usable(*self as f64)
    }
}

impl AmericanOdds for i64 {
    fn american(&self) -> Option<f64> {
        usable(*self as f64)
    }
}

impl AmericanOdds for str {
    fn american(&self) -> Option<f64> {
        // "+150" is how people write underdog odds
        let trimmed = self.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        digits.parse::<f64>().ok().and_then(usable)
    }
}

impl AmericanOdds for String {
    fn american(&self) -> Option<f64> {
        self.as_str().american()
    }
}

impl AmericanOdds for serde_json::Value {
    fn american(&self) -> Option<f64> {
        match self {
            serde_json::Value::Number(n) => n.as_f64().and_then(usable),
            serde_json::Value::String(s) => s.american(),
            _ => None,
        }
    }
}

impl<T: AmericanOdds + ?Sized> AmericanOdds for &T {
    fn american(&self) -> Option<f64> {
        (**self).american()
    }
}

impl<T: AmericanOdds> AmericanOdds for Option<T> {
    fn american(&self) -> Option<f64> {
        self.as_ref().and_then(|o| o.american())
    }
}

/// Convert American odds to implied probability
/// Positive odds (+150) mean you win $150 on a $100 bet
/// Negative odds (-150) mean you need to bet $150 to win $100
pub fn implied_probability(odds: impl AmericanOdds) -> f64 {
    match odds.american() {
        // For positive odds: 100 / (odds + 100)
        Some(o) if o > 0.0 => 100.0 / (o + 100.0),
        // For negative odds: |odds| / (|odds| + 100)
        Some(o) => {
            let abs_odds = o.abs();
            abs_odds / (abs_odds + 100.0)
        }
        None => FALLBACK_PROBABILITY,
    }
}

/// Convert American odds to the decimal multiplier (stake * decimal = total return)
pub fn to_decimal_odds(odds: impl AmericanOdds) -> Option<f64> {
    odds.american().map(|o| {
        if o > 0.0 {
            o / 100.0 + 1.0
        } else {
            100.0 / o.abs() + 1.0
        }
    })
}

/// Render odds in the user's preferred notation, "N/A" when unreadable
pub fn format_for_display(odds: impl AmericanOdds, format: OddsFormat) -> String {
    let Some(o) = odds.american() else {
        return UNAVAILABLE.to_string();
    };

    match format {
        OddsFormat::American => {
            let whole = o as i64;
            if o > 0.0 {
                format!("+{}", whole)
            } else {
                format!("{}", whole)
            }
        }
        OddsFormat::Decimal => match to_decimal_odds(o) {
            Some(decimal) => format!("{:.2}", decimal),
            None => UNAVAILABLE.to_string(),
        },
    }
}

/// Winnings on a stake at the given odds, not counting the returned stake
pub fn profit(stake: f64, odds: impl AmericanOdds) -> f64 {
    match odds.american() {
        Some(o) if o > 0.0 => stake * (o / 100.0),
        Some(o) => stake * (100.0 / o.abs()),
        None => 0.0,
    }
}

/// Stake plus winnings
pub fn total_payout(stake: f64, odds: impl AmericanOdds) -> f64 {
    stake + profit(stake, odds)
}

/// Everything a bet slip shows for a stake at given odds
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WagerQuote {
    pub odds_display: String,
    pub implied_probability: f64,
    pub stake: f64,
    pub profit: f64,
    pub total_payout: f64,
}

impl WagerQuote {
    pub fn new(stake: f64, odds: impl AmericanOdds, format: OddsFormat) -> Self {
        let odds = odds.american();
        let profit = profit(stake, odds);
        Self {
            odds_display: format_for_display(odds, format),
            implied_probability: implied_probability(odds),
            stake,
            profit,
            total_payout: stake + profit,
        }
    }

    pub fn format(&self) -> String {
        format!(
            "Odds: {} | Imp. Prob: {:.1}% | To Win: ${:.2} | Total Payout: ${:.2}",
            self.odds_display,
            self.implied_probability * 100.0,
            self.profit,
            self.total_payout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implied_probability() {
        // Positive odds
        let prob = implied_probability(150);
        assert!((prob - 0.4).abs() < 0.01);
        // Negative odds
        let prob = implied_probability(-150);
        assert!((prob - 0.6).abs() < 0.01);
        // Even odds
        let prob = implied_probability(100);
        assert!((prob - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_implied_probability_sides_of_even() {
        for o in [100, 101, 110, 150, 250, 1000, 25000] {
            let dog = implied_probability(o);
            let fav = implied_probability(-o);
            assert!(dog > 0.0 && dog <= 0.5, "+{} gave {}", o, dog);
            assert!(fav >= 0.5 && fav < 1.0, "-{} gave {}", o, fav);
            if o > 100 {
                assert!(dog < 0.5 && fav > 0.5);
            }
        }
    }

    #[test]
    fn test_malformed_odds_fall_back() {
        assert_eq!(implied_probability("bad"), FALLBACK_PROBABILITY);
        assert_eq!(implied_probability(0), FALLBACK_PROBABILITY);
        assert_eq!(implied_probability(f64::NAN), FALLBACK_PROBABILITY);
        assert_eq!(profit(100.0, "bad"), 0.0);
        assert_eq!(profit(100.0, 0.0), 0.0);
        assert_eq!(total_payout(40.0, ""), 40.0);
        assert_eq!(to_decimal_odds("bad"), None);
        assert_eq!(format_for_display(0, OddsFormat::Decimal), "N/A");
    }

    #[test]
    fn test_string_and_json_inputs() {
        assert_eq!("+150".american(), Some(150.0));
        assert_eq!(" -110 ".american(), Some(-110.0));
        assert_eq!(serde_json::json!(-200).american(), Some(-200.0));
        assert_eq!(serde_json::json!("130").american(), Some(130.0));
        assert_eq!(serde_json::json!(null).american(), None);
        assert_eq!(None::<f64>.american(), None);
    }

    #[test]
    fn test_to_decimal_odds() {
        assert!((to_decimal_odds(150).unwrap() - 2.50).abs() < 1e-9);
        assert!((to_decimal_odds(-150).unwrap() - 1.6667).abs() < 1e-4);
        assert!((to_decimal_odds(100).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_for_display() {
        assert_eq!(format_for_display(150, OddsFormat::American), "+150");
        assert_eq!(format_for_display(-150, OddsFormat::American), "-150");
        assert_eq!(format_for_display("bad", OddsFormat::American), "N/A");
        assert_eq!(format_for_display(150, OddsFormat::Decimal), "2.50");
        assert_eq!(format_for_display(-150, OddsFormat::Decimal), "1.67");
        // Fractional American odds are shown as whole numbers
        assert_eq!(format_for_display(-110.5, OddsFormat::American), "-110");
    }

    #[test]
    fn test_profit_and_payout() {
        assert!((profit(100.0, 150) - 150.0).abs() < 1e-9);
        assert!((profit(100.0, -150) - 66.67).abs() < 0.01);

        for (stake, odds) in [(50.0, -150.0), (10.0, 130.0), (1.0, -110.0), (250.0, 400.0)] {
            assert!((total_payout(stake, odds) - (stake + profit(stake, odds))).abs() < 1e-9);
        }
    }

    #[test]
    fn test_wager_quote() {
        let quote = WagerQuote::new(50.0, -150, OddsFormat::American);
        assert_eq!(quote.odds_display, "-150");
        assert!((quote.implied_probability - 0.6).abs() < 1e-9);
        assert!((quote.profit - 33.333).abs() < 0.001);
        assert!((quote.total_payout - 83.333).abs() < 0.001);
        assert!(quote.format().contains("Total Payout: $83.33"));

        let unreadable = WagerQuote::new(50.0, "bad", OddsFormat::Decimal);
        assert_eq!(unreadable.odds_display, "N/A");
        assert_eq!(unreadable.total_payout, 50.0);
    }
}
