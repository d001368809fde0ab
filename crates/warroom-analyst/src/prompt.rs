//! Prompt rendering for the strategy synthesizer.
//!
//! Everything here is a pure function of its inputs so the same change set
//! always produces byte-identical prompts.

use rust_decimal::Decimal;
use warroom_core::{ChangeKind, ChangeRecord, Language, TrackedStore};

const SYSTEM_PROMPT_EN: &str = "You are a Lead E-commerce Strategist & Data Quant. \
Your job: analyze competitor products and return ONLY valid JSON. \
NEVER write markdown, explanatory text, or code blocks. \
ONLY the raw JSON object, nothing before or after.";

const SYSTEM_PROMPT_ES: &str = "Eres un Estratega Principal de E-commerce y Analista Cuantitativo. \
Tu trabajo: analizar productos de la competencia y devolver SOLO JSON válido. \
NUNCA escribas markdown, texto explicativo ni bloques de código. \
SOLO el objeto JSON crudo, nada antes ni después.";

const RESPONSE_TEMPLATE: &str = r#"{
  "market_bias": "AGGRESSIVE",
  "sentiment_score": 75,
  "sentiment_reasoning": "...",
  "alpha_opportunity": {
    "product": "...",
    "reason": "...",
    "suggested_action": "...",
    "estimated_impact": "HIGH"
  },
  "high_conviction_bets": [
    {"bet": "...", "probability": "80%", "timeframe": "NOW", "reasoning": "..."},
    {"bet": "...", "probability": "65%", "timeframe": "THIS_WEEK", "reasoning": "..."},
    {"bet": "...", "probability": "50%", "timeframe": "THIS_MONTH", "reasoning": "..."}
  ],
  "price_gap_analysis": "...",
  "risk_assessment": "..."
}"#;

const BIAS_LEGEND: &str =
    "market_bias: AGGRESSIVE=attack now | DEFENSIVE=protect margins | NEUTRAL=gather more data";

const KIND_ORDER: [ChangeKind; 5] = [
    ChangeKind::Increased,
    ChangeKind::Decreased,
    ChangeKind::New,
    ChangeKind::Removed,
    ChangeKind::Unchanged,
];

#[must_use]
pub fn system_prompt(language: Language) -> &'static str {
    match language {
        Language::English => SYSTEM_PROMPT_EN,
        Language::Spanish => SYSTEM_PROMPT_ES,
    }
}

fn language_instruction(language: Language) -> &'static str {
    match language {
        Language::English => "IMPORTANT: Write ALL text values in ENGLISH.",
        Language::Spanish => "IMPORTANT: Write ALL text values in SPANISH.",
    }
}

/// Min, max and mean of the current prices in `changes`, or `None` when no
/// record carries a current price.
#[must_use]
pub fn price_stats(changes: &[ChangeRecord]) -> Option<(Decimal, Decimal, Decimal)> {
    let prices: Vec<Decimal> = changes.iter().filter_map(|c| c.current_price).collect();
    let min = prices.iter().min().copied()?;
    let max = prices.iter().max().copied()?;
    let sum: Decimal = prices.iter().copied().sum();
    let avg = (sum / Decimal::from(prices.len())).round_dp(2);
    Some((min, max, avg))
}

fn format_price(price: Option<Decimal>) -> String {
    price.map_or_else(|| "-".to_owned(), |p| format!("{p:.2}"))
}

fn change_line(change: &ChangeRecord) -> String {
    let delta = change.percent_delta.map_or_else(String::new, |d| {
        let sign = if d > Decimal::ZERO { "+" } else { "" };
        format!(" ({sign}{d:.2}%)")
    });
    format!(
        "- {title} [id {id}] {kind}: {prev} -> {cur} {currency}{delta}",
        title = change.title,
        id = change.product_id,
        kind = change.kind,
        prev = format_price(change.previous_price),
        cur = format_price(change.current_price),
        currency = change.currency_code,
    )
}

/// Renders the user message for one store.
///
/// `all_changes` is the full change set and drives the counts; `selected`
/// is the truncated slice that is listed line by line and summarized.
#[must_use]
pub fn render_user_prompt(
    store: &TrackedStore,
    all_changes: &[ChangeRecord],
    selected: &[ChangeRecord],
    language: Language,
) -> String {
    let counts: Vec<String> = KIND_ORDER
        .iter()
        .map(|kind| {
            let n = all_changes.iter().filter(|c| c.kind == *kind).count();
            format!("{kind}={n}")
        })
        .collect();
    let stats = match price_stats(selected) {
        Some((min, max, avg)) => format!("Avg Price: {avg:.2} | Min: {min:.2} | Max: {max:.2}"),
        None => "Avg Price: - | Min: - | Max: -".to_owned(),
    };
    let heading = if selected.len() < all_changes.len() {
        format!(
            "PRODUCT LINES (top {} of {} by significance):",
            selected.len(),
            all_changes.len()
        )
    } else {
        "PRODUCT LINES:".to_owned()
    };

    let mut lines = vec![
        language_instruction(language).to_owned(),
        String::new(),
        format!("COMPETITOR: {} ({})", store.name, store.base_url),
        format!("CHANGES: {} total ({})", all_changes.len(), counts.join(", ")),
        stats,
        String::new(),
        heading,
    ];
    lines.extend(selected.iter().map(change_line));
    lines.extend([
        String::new(),
        "Return EXACTLY this JSON structure:".to_owned(),
        RESPONSE_TEMPLATE.to_owned(),
        String::new(),
        BIAS_LEGEND.to_owned(),
        "sentiment_score: integer 0-100".to_owned(),
        language_instruction(language).to_owned(),
    ]);
    lines.join("\n")
}

/// Follow-up message sent after a reply failed validation.
#[must_use]
pub fn strict_retry_instruction(reason: &str) -> String {
    format!(
        "Your previous reply could not be used: {reason}.\n\
         Reply again with ONLY the raw JSON object and nothing else. \
         `market_bias` must be one of AGGRESSIVE, DEFENSIVE, NEUTRAL. \
         `sentiment_score` must be an integer from 0 to 100. \
         `high_conviction_bets` must be a list of objects, each with `bet` and `probability`.\n\
         Structure:\n{RESPONSE_TEMPLATE}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TrackedStore {
        TrackedStore {
            id: 1,
            name: "Cann".to_owned(),
            base_url: "https://drinkcann.com".to_owned(),
            is_active: true,
        }
    }

    fn change(id: &str, kind: ChangeKind, prev: Option<i64>, cur: Option<i64>) -> ChangeRecord {
        ChangeRecord {
            product_id: id.to_owned(),
            title: format!("Product {id}"),
            kind,
            previous_price: prev.map(|c| Decimal::new(c, 2)),
            current_price: cur.map(|c| Decimal::new(c, 2)),
            currency_code: "USD".to_owned(),
            percent_delta: match (prev, cur) {
                (Some(p), Some(c)) => Some(warroom_core::changes::percent_delta(
                    Decimal::new(p, 2),
                    Decimal::new(c, 2),
                )),
                _ => None,
            },
        }
    }

    fn sample() -> Vec<ChangeRecord> {
        vec![
            change("A", ChangeKind::Increased, Some(1000), Some(1200)),
            change("B", ChangeKind::Removed, Some(2000), None),
            change("C", ChangeKind::New, None, Some(500)),
        ]
    }

    #[test]
    fn rendering_is_deterministic() {
        let changes = sample();
        let a = render_user_prompt(&store(), &changes, &changes, Language::English);
        let b = render_user_prompt(&store(), &changes, &changes, Language::English);
        assert_eq!(a, b);
    }

    #[test]
    fn prompt_lists_counts_stats_and_lines() {
        let changes = sample();
        let prompt = render_user_prompt(&store(), &changes, &changes, Language::English);

        assert!(prompt.contains("COMPETITOR: Cann (https://drinkcann.com)"));
        assert!(prompt.contains("CHANGES: 3 total (INCREASED=1, DECREASED=0, NEW=1, REMOVED=1, UNCHANGED=0)"));
        assert!(prompt.contains("Avg Price: 8.50 | Min: 5.00 | Max: 12.00"));
        assert!(prompt.contains("- Product A [id A] INCREASED: 10.00 -> 12.00 USD (+20.00%)"));
        assert!(prompt.contains("- Product B [id B] REMOVED: 20.00 -> - USD"));
        assert!(prompt.contains("- Product C [id C] NEW: - -> 5.00 USD"));
        assert!(prompt.contains(BIAS_LEGEND));
        assert!(prompt.contains("in ENGLISH"));
    }

    #[test]
    fn prompt_opens_and_closes_with_language_instruction() {
        let changes = sample();
        let prompt = render_user_prompt(&store(), &changes, &changes, Language::English);
        let lines: Vec<&str> = prompt.lines().collect();

        assert_eq!(lines[0], language_instruction(Language::English));
        assert_eq!(lines[1], "");
        assert_eq!(lines.last().copied(), Some(language_instruction(Language::English)));
        assert!(!prompt.ends_with('\n'));

        let heading = lines.iter().position(|l| *l == "PRODUCT LINES:").unwrap();
        assert!(lines[heading + 1].contains("[id A]"));
        assert!(lines[heading + 2].contains("[id B]"));
        assert!(lines[heading + 3].contains("[id C]"));
        assert_eq!(lines[heading + 4], "");
    }

    #[test]
    fn one_cent_increase_is_rendered_with_plus_sign() {
        let tiny = vec![change("T", ChangeKind::Increased, Some(30_000), Some(30_001))];
        let prompt = render_user_prompt(&store(), &tiny, &tiny, Language::English);
        assert!(prompt.contains("- Product T [id T] INCREASED: 300.00 -> 300.01 USD (+0.01%)"));
    }

    #[test]
    fn truncated_prompt_says_so_and_omits_the_tail() {
        let changes = sample();
        let prompt = render_user_prompt(&store(), &changes, &changes[..1], Language::Spanish);

        assert!(prompt.contains("top 1 of 3"));
        assert!(!prompt.contains("[id B]"));
        assert!(prompt.contains("CHANGES: 3 total"));
        assert!(prompt.contains("in SPANISH"));
    }

    #[test]
    fn stats_absent_when_nothing_has_a_current_price() {
        let only_removed = vec![change("B", ChangeKind::Removed, Some(2000), None)];
        assert!(price_stats(&only_removed).is_none());
    }

    #[test]
    fn retry_instruction_quotes_reason() {
        let text = strict_retry_instruction("missing required field `sentiment_score`");
        assert!(text.contains("missing required field `sentiment_score`"));
        assert!(text.contains("ONLY the raw JSON object"));
    }

    #[test]
    fn system_prompt_follows_language() {
        assert!(system_prompt(Language::English).contains("ONLY valid JSON"));
        assert!(system_prompt(Language::Spanish).contains("SOLO JSON"));
    }
}
