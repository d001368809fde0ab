//! Per-store cycle bookkeeping shared by the scheduler and the audit trail.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identity and start time of one scheduler cycle.
///
/// Every observation and analysis written during the cycle carries the same
/// `cycle_id` and uses `started_at` as its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleContext {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl CycleContext {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            started_at,
        }
    }
}

/// Stage of a single store's cycle.
///
/// `Idle → Fetching → Diffing → Synthesizing → Persisted`, with `Skipped`
/// terminal on an unrecoverable per-store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleStage {
    Idle,
    Fetching,
    Diffing,
    Synthesizing,
    Persisted,
    Skipped,
}

impl CycleStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CycleStage::Idle => "idle",
            CycleStage::Fetching => "fetching",
            CycleStage::Diffing => "diffing",
            CycleStage::Synthesizing => "synthesizing",
            CycleStage::Persisted => "persisted",
            CycleStage::Skipped => "skipped",
        }
    }

    /// Returns `true` for the two states a store cycle can end in.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, CycleStage::Persisted | CycleStage::Skipped)
    }
}

impl std::fmt::Display for CycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one store within one cycle, as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReport {
    pub store_id: i64,
    pub store_name: String,
    /// Always terminal: `Persisted` or `Skipped`.
    pub stage: CycleStage,
    /// Stage that was in progress when the store was skipped.
    pub failed_stage: Option<CycleStage>,
    pub change_count: usize,
    pub degraded: bool,
    pub error: Option<String>,
}

impl StoreReport {
    #[must_use]
    pub fn persisted(store_id: i64, store_name: &str, change_count: usize, degraded: bool) -> Self {
        Self {
            store_id,
            store_name: store_name.to_string(),
            stage: CycleStage::Persisted,
            failed_stage: None,
            change_count,
            degraded,
            error: None,
        }
    }

    #[must_use]
    pub fn skipped(
        store_id: i64,
        store_name: &str,
        failed_stage: CycleStage,
        error: impl Into<String>,
    ) -> Self {
        Self {
            store_id,
            store_name: store_name.to_string(),
            stage: CycleStage::Skipped,
            failed_stage: Some(failed_stage),
            change_count: 0,
            degraded: false,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.stage == CycleStage::Persisted
    }
}

/// Totals for a finished cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub persisted: usize,
    pub skipped: usize,
    pub degraded: usize,
}

impl CycleSummary {
    #[must_use]
    pub fn from_reports(reports: &[StoreReport]) -> Self {
        reports.iter().fold(Self::default(), |mut acc, r| {
            if r.is_persisted() {
                acc.persisted += 1;
                if r.degraded {
                    acc.degraded += 1;
                }
            } else {
                acc.skipped += 1;
            }
            acc
        })
    }
}
