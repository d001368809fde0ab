//! Parsing and validation of the model's JSON reply.
//!
//! The reply is first deserialized into [`RawAnalysis`], where every field
//! is optional and loosely typed, then validated into a [`ParsedAnalysis`]
//! or a [`SchemaError`].

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use warroom_core::{Bet, CycleContext, MarketAnalysis, MarketBias, Percentage};

use crate::error::SchemaError;

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"```(?:[A-Za-z]+)?").ok());

/// Strips Markdown code fences and returns the text from the first `{` to
/// the last `}`.
#[must_use]
pub fn extract_json_object(raw: &str) -> Option<String> {
    let cleaned = match CODE_FENCE.as_ref() {
        Some(fence) => fence.replace_all(raw, ""),
        None => Cow::Borrowed(raw),
    };
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end < start {
        return None;
    }
    Some(cleaned[start..=end].to_owned())
}

/// The model reply as received. Nothing is required at this stage.
#[derive(Debug, Default, Deserialize)]
pub struct RawAnalysis {
    pub market_bias: Option<Value>,
    pub sentiment_score: Option<Value>,
    pub sentiment_reasoning: Option<Value>,
    pub alpha_opportunity: Option<Value>,
    pub high_conviction_bets: Option<Value>,
    pub price_gap_analysis: Option<Value>,
    pub risk_assessment: Option<Value>,
}

/// A validated reply, ready to become a [`MarketAnalysis`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAnalysis {
    pub bias: MarketBias,
    pub sentiment_score: Percentage,
    pub sentiment_reasoning: Option<String>,
    pub alpha_opportunity: String,
    /// Highest probability first.
    pub bets: Vec<Bet>,
    pub price_gap_analysis: Option<String>,
    pub risk_assessment: Option<String>,
}

impl ParsedAnalysis {
    #[must_use]
    pub fn into_analysis(
        self,
        store_id: i64,
        cycle: &CycleContext,
        model: &str,
        raw_response: String,
        changes_considered: usize,
    ) -> MarketAnalysis {
        MarketAnalysis {
            store_id,
            cycle_id: cycle.cycle_id,
            generated_at: cycle.started_at,
            bias: self.bias,
            sentiment_score: self.sentiment_score,
            sentiment_reasoning: self.sentiment_reasoning,
            alpha_opportunity: self.alpha_opportunity,
            bets: self.bets,
            price_gap_analysis: self.price_gap_analysis,
            risk_assessment: self.risk_assessment,
            raw_response,
            degraded: false,
            model: model.to_owned(),
            changes_considered,
        }
    }
}

/// Extracts, deserializes and validates a model reply.
///
/// # Errors
///
/// Returns [`SchemaError`] when no JSON object can be found, the JSON is
/// invalid, `market_bias` or `sentiment_score` is missing, the score is not
/// a number in `0..=100`, or the bet list is malformed.
pub fn parse_analysis(raw: &str) -> Result<ParsedAnalysis, SchemaError> {
    let json = extract_json_object(raw).ok_or(SchemaError::NoJsonObject)?;
    let parsed: RawAnalysis =
        serde_json::from_str(&json).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
    validate(parsed)
}

/// # Errors
///
/// See [`parse_analysis`].
pub fn validate(raw: RawAnalysis) -> Result<ParsedAnalysis, SchemaError> {
    let bias = match raw.market_bias {
        None | Some(Value::Null) => return Err(SchemaError::MissingField("market_bias")),
        // Anything unrecognized, including non-string values, reads as NEUTRAL.
        Some(other) => MarketBias::from_label(&text_of(&other).unwrap_or_default()),
    };

    let score = match raw.sentiment_score {
        None | Some(Value::Null) => return Err(SchemaError::MissingField("sentiment_score")),
        Some(value) => number_of(&value).ok_or_else(|| SchemaError::InvalidField {
            field: "sentiment_score",
            reason: format!("not a number: {value}"),
        })?,
    };
    let rounded = score.round();
    if !(0.0..=100.0).contains(&rounded) {
        return Err(SchemaError::InvalidField {
            field: "sentiment_score",
            reason: format!("{score} is outside 0..=100"),
        });
    }

    let bets = match raw.high_conviction_bets {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => parse_bets(items)?,
        Some(other) => {
            return Err(SchemaError::InvalidField {
                field: "high_conviction_bets",
                reason: format!("expected a list, got {other}"),
            })
        }
    };

    Ok(ParsedAnalysis {
        bias,
        sentiment_score: Percentage::clamped(score),
        sentiment_reasoning: raw.sentiment_reasoning.as_ref().and_then(text_of),
        alpha_opportunity: raw
            .alpha_opportunity
            .as_ref()
            .map(alpha_text)
            .unwrap_or_default(),
        bets,
        price_gap_analysis: raw.price_gap_analysis.as_ref().and_then(text_of),
        risk_assessment: raw.risk_assessment.as_ref().and_then(text_of),
    })
}

fn parse_bets(items: Vec<Value>) -> Result<Vec<Bet>, SchemaError> {
    let mut bets = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(fields) = item else {
            return Err(bet_error(index, "expected an object"));
        };
        bets.push(parse_bet(index, &fields)?);
    }
    // Stable, so equal probabilities keep the model's order.
    bets.sort_by(|a, b| b.probability.cmp(&a.probability));
    Ok(bets)
}

fn parse_bet(index: usize, fields: &Map<String, Value>) -> Result<Bet, SchemaError> {
    let action = fields
        .get("bet")
        .or_else(|| fields.get("action"))
        .and_then(text_of)
        .ok_or_else(|| bet_error(index, "missing `bet`"))?;
    let probability = match fields.get("probability") {
        None | Some(Value::Null) => return Err(bet_error(index, "missing `probability`")),
        Some(value) => number_of(value)
            .map(Percentage::clamped)
            .ok_or_else(|| bet_error(index, &format!("probability {value} is not a number")))?,
    };
    Ok(Bet {
        action,
        probability,
        timeframe: fields.get("timeframe").and_then(text_of),
        reasoning: fields.get("reasoning").and_then(text_of),
    })
}

fn bet_error(index: usize, reason: &str) -> SchemaError {
    SchemaError::InvalidField {
        field: "high_conviction_bets",
        reason: format!("bet {index}: {reason}"),
    }
}

/// Reads a number from a JSON number or a numeric string such as `"80%"`.
fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

/// `"{product} - {reason} [{suggested_action}]"` for a structured
/// opportunity, the text itself otherwise.
fn alpha_text(value: &Value) -> String {
    match value {
        Value::Object(fields) => {
            let field = |name: &str| fields.get(name).and_then(text_of).unwrap_or_default();
            format!(
                "{} - {} [{}]",
                field("product"),
                field("reason"),
                field("suggested_action")
            )
        }
        other => text_of(other).unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
