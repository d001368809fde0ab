//! Market analysis records produced by the strategy synthesizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cycle::CycleContext;

/// Overall stance recommended against a competitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketBias {
    /// Attack now.
    Aggressive,
    /// Protect margins.
    Defensive,
    /// Gather more data.
    Neutral,
}

impl MarketBias {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MarketBias::Aggressive => "AGGRESSIVE",
            MarketBias::Defensive => "DEFENSIVE",
            MarketBias::Neutral => "NEUTRAL",
        }
    }

    /// Maps a free-form label onto one of the three biases.
    ///
    /// Matching ignores case and surrounding whitespace; anything
    /// unrecognized becomes [`MarketBias::Neutral`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "AGGRESSIVE" => MarketBias::Aggressive,
            "DEFENSIVE" => MarketBias::Defensive,
            _ => MarketBias::Neutral,
        }
    }
}

impl std::fmt::Display for MarketBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An integer percentage that is always within `0..=100`.
///
/// Every constructor clamps, so an out-of-range value can never be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct Percentage(u8);

impl Percentage {
    pub const NEUTRAL: Percentage = Percentage(50);

    /// Rounds and clamps a float. `NaN` maps to zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Percentage(0);
        }
        Percentage(value.round().clamp(0.0, 100.0) as u8)
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<i64> for Percentage {
    fn from(value: i64) -> Self {
        // Clamped into 0..=100 first, so the conversion cannot fail.
        Percentage(u8::try_from(value.clamp(0, 100)).unwrap_or(0))
    }
}

impl From<Percentage> for i64 {
    fn from(value: Percentage) -> Self {
        i64::from(value.0)
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recommended action with its estimated success probability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub action: String,
    pub probability: Percentage,
    /// e.g. `"NOW"`, `"THIS_WEEK"`, `"THIS_MONTH"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Strategy narrative for one store and one cycle. Never mutated after
/// creation; later cycles add new records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub store_id: i64,
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub bias: MarketBias,
    pub sentiment_score: Percentage,
    pub sentiment_reasoning: Option<String>,
    /// Product-level recommendation; empty for degraded analyses.
    pub alpha_opportunity: String,
    /// Ordered, highest conviction first.
    pub bets: Vec<Bet>,
    pub price_gap_analysis: Option<String>,
    pub risk_assessment: Option<String>,
    /// Model output as received, kept for audit.
    pub raw_response: String,
    /// `true` when produced by the fallback path after a schema failure.
    pub degraded: bool,
    pub model: String,
    /// Number of change records included in the prompt.
    pub changes_considered: usize,
}

impl MarketAnalysis {
    /// Neutral fallback used when the model never produced a usable answer.
    #[must_use]
    pub fn degraded(
        store_id: i64,
        cycle: &CycleContext,
        model: &str,
        raw_response: String,
        changes_considered: usize,
    ) -> Self {
        Self {
            store_id,
            cycle_id: cycle.cycle_id,
            generated_at: cycle.started_at,
            bias: MarketBias::Neutral,
            sentiment_score: Percentage::NEUTRAL,
            sentiment_reasoning: None,
            alpha_opportunity: String::new(),
            bets: Vec::new(),
            price_gap_analysis: None,
            risk_assessment: None,
            raw_response,
            degraded: true,
            model: model.to_string(),
            changes_considered,
        }
    }
}
