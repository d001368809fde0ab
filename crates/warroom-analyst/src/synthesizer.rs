//! Turns a store's change set into a [`MarketAnalysis`].

use std::sync::Arc;

use warroom_core::{AppConfig, ChangeRecord, CycleContext, Language, MarketAnalysis, TrackedStore};

use crate::client::{ChatMessage, InferenceClient};
use crate::error::InferenceError;
use crate::prompt::{render_user_prompt, strict_retry_instruction, system_prompt};
use crate::schema::parse_analysis;

#[derive(Debug, Clone, Copy)]
pub struct SynthesizerSettings {
    /// Number of most significant change records sent to the model.
    pub max_changes_per_prompt: usize,
    pub language: Language,
}

impl SynthesizerSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_changes_per_prompt: config.max_changes_per_prompt,
            language: config.analysis_language,
        }
    }
}

impl Default for SynthesizerSettings {
    fn default() -> Self {
        Self {
            max_changes_per_prompt: 25,
            language: Language::English,
        }
    }
}

pub struct Synthesizer {
    client: Arc<dyn InferenceClient>,
    settings: SynthesizerSettings,
}

impl Synthesizer {
    #[must_use]
    pub fn new(client: Arc<dyn InferenceClient>, settings: SynthesizerSettings) -> Self {
        Self { client, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &SynthesizerSettings {
        &self.settings
    }

    /// Produces the analysis for one store and cycle.
    ///
    /// `changes` must be in significance order; only the first
    /// `max_changes_per_prompt` records are sent. A reply that fails
    /// validation is retried once with a stricter instruction; if that also
    /// fails the result is a degraded analysis rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`InferenceError`] only when the first inference call fails.
    pub async fn synthesize(
        &self,
        store: &TrackedStore,
        changes: &[ChangeRecord],
        cycle: &CycleContext,
    ) -> Result<MarketAnalysis, InferenceError> {
        let selected = &changes[..changes.len().min(self.settings.max_changes_per_prompt)];
        let considered = selected.len();
        let model = self.client.model().to_owned();
        tracing::debug!(
            store = %store.name,
            changes = changes.len(),
            considered,
            language = self.settings.language.code(),
            "requesting market analysis"
        );

        let mut messages = vec![
            ChatMessage::system(system_prompt(self.settings.language)),
            ChatMessage::user(render_user_prompt(
                store,
                changes,
                selected,
                self.settings.language,
            )),
        ];

        let first = self.client.complete(&messages).await?;
        let reason = match parse_analysis(&first) {
            Ok(parsed) => {
                return Ok(parsed.into_analysis(store.id, cycle, &model, first, considered));
            }
            Err(err) => err.to_string(),
        };

        tracing::warn!(
            store = %store.name,
            error = %reason,
            "model reply failed validation, retrying with strict instruction"
        );
        messages.push(ChatMessage::assistant(first.clone()));
        messages.push(ChatMessage::user(strict_retry_instruction(&reason)));

        let (raw, failure) = match self.client.complete(&messages).await {
            Ok(second) => match parse_analysis(&second) {
                Ok(parsed) => {
                    return Ok(parsed.into_analysis(store.id, cycle, &model, second, considered));
                }
                Err(err) => (second, err.to_string()),
            },
            Err(err) => (first, err.to_string()),
        };

        tracing::warn!(
            store = %store.name,
            error = %failure,
            "strict retry failed, storing degraded analysis"
        );
        Ok(MarketAnalysis::degraded(
            store.id, cycle, &model, raw, considered,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;
    use warroom_core::{ChangeKind, MarketBias};

    /// Replays scripted replies and records every conversation it receives.
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, InferenceError>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, InferenceError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
            self.seen.lock().await.push(messages.to_vec());
            self.replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Err(InferenceError::Timeout { timeout_secs: 1 }))
        }
    }

    fn store() -> TrackedStore {
        TrackedStore {
            id: 9,
            name: "Rival".to_owned(),
            base_url: "https://rival.test".to_owned(),
            is_active: true,
        }
    }

    fn changes(n: usize) -> Vec<ChangeRecord> {
        (0..n)
            .map(|i| ChangeRecord {
                product_id: format!("p{i}"),
                title: format!("Product {i}"),
                kind: ChangeKind::New,
                previous_price: None,
                current_price: Some(Decimal::new(1000, 2)),
                currency_code: "USD".to_owned(),
                percent_delta: None,
            })
            .collect()
    }

    const GOOD: &str = r#"{"market_bias": "DEFENSIVE", "sentiment_score": 30,
        "high_conviction_bets": [{"bet": "Hold", "probability": "70%"}]}"#;
    const MISSING_SCORE: &str = r#"{"market_bias": "AGGRESSIVE"}"#;

    fn synthesizer(client: Arc<ScriptedClient>, max: usize) -> Synthesizer {
        Synthesizer::new(
            client,
            SynthesizerSettings {
                max_changes_per_prompt: max,
                language: Language::English,
            },
        )
    }

    #[tokio::test]
    async fn valid_reply_becomes_analysis() {
        let client = ScriptedClient::new(vec![Ok(GOOD.to_owned())]);
        let cycle = CycleContext::new(Utc::now());
        let analysis = synthesizer(Arc::clone(&client), 25)
            .synthesize(&store(), &changes(3), &cycle)
            .await
            .unwrap();

        assert!(!analysis.degraded);
        assert_eq!(analysis.bias, MarketBias::Defensive);
        assert_eq!(analysis.sentiment_score.get(), 30);
        assert_eq!(analysis.bets.len(), 1);
        assert_eq!(analysis.store_id, 9);
        assert_eq!(analysis.cycle_id, cycle.cycle_id);
        assert_eq!(analysis.generated_at, cycle.started_at);
        assert_eq!(analysis.model, "scripted");
        assert_eq!(analysis.changes_considered, 3);
        assert_eq!(client.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn prompt_is_truncated_to_most_significant_changes() {
        let client = ScriptedClient::new(vec![Ok(GOOD.to_owned())]);
        let analysis = synthesizer(Arc::clone(&client), 2)
            .synthesize(&store(), &changes(5), &CycleContext::new(Utc::now()))
            .await
            .unwrap();

        assert_eq!(analysis.changes_considered, 2);
        let seen = client.seen.lock().await;
        let user = &seen[0][1].content;
        assert!(user.contains("[id p0]"));
        assert!(user.contains("[id p1]"));
        assert!(!user.contains("[id p2]"));
    }

    #[tokio::test]
    async fn schema_failure_then_success_uses_retry() {
        let client = ScriptedClient::new(vec![Ok(MISSING_SCORE.to_owned()), Ok(GOOD.to_owned())]);
        let analysis = synthesizer(Arc::clone(&client), 25)
            .synthesize(&store(), &changes(1), &CycleContext::new(Utc::now()))
            .await
            .unwrap();

        assert!(!analysis.degraded);
        assert_eq!(analysis.bias, MarketBias::Defensive);

        let seen = client.seen.lock().await;
        assert_eq!(seen.len(), 2);
        let retry = &seen[1];
        assert_eq!(retry.len(), 4);
        assert_eq!(retry[2].content, MISSING_SCORE);
        assert!(retry[3].content.contains("sentiment_score"));
    }

    #[tokio::test]
    async fn two_schema_failures_degrade() {
        let client = ScriptedClient::new(vec![
            Ok(MISSING_SCORE.to_owned()),
            Ok("still not json".to_owned()),
        ]);
        let analysis = synthesizer(client, 25)
            .synthesize(&store(), &changes(2), &CycleContext::new(Utc::now()))
            .await
            .unwrap();

        assert!(analysis.degraded);
        assert_eq!(analysis.bias, MarketBias::Neutral);
        assert_eq!(analysis.sentiment_score.get(), 50);
        assert!(analysis.bets.is_empty());
        assert!(analysis.alpha_opportunity.is_empty());
        assert_eq!(analysis.raw_response, "still not json");
        assert_eq!(analysis.changes_considered, 2);
    }

    #[tokio::test]
    async fn inference_failure_on_retry_degrades_with_first_reply() {
        let client = ScriptedClient::new(vec![
            Ok(MISSING_SCORE.to_owned()),
            Err(InferenceError::Timeout { timeout_secs: 1 }),
        ]);
        let analysis = synthesizer(client, 25)
            .synthesize(&store(), &changes(1), &CycleContext::new(Utc::now()))
            .await
            .unwrap();

        assert!(analysis.degraded);
        assert_eq!(analysis.raw_response, MISSING_SCORE);
    }

    #[tokio::test]
    async fn inference_failure_on_first_call_is_returned() {
        let client = ScriptedClient::new(vec![Err(InferenceError::HttpStatus {
            status: 401,
            body: "bad key".to_owned(),
        })]);
        let err = synthesizer(client, 25)
            .synthesize(&store(), &changes(1), &CycleContext::new(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::HttpStatus { status: 401, .. }));
    }
}
