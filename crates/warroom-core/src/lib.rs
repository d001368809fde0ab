pub mod analysis;
pub mod app_config;
pub mod changes;
pub mod config;
pub mod cycle;
pub mod products;
pub mod stores;

use thiserror::Error;

pub use analysis::{Bet, MarketAnalysis, MarketBias, Percentage};
pub use app_config::{AppConfig, Environment, Language};
pub use changes::{detect_changes, ChangeKind, ChangeRecord, PERCENT_DELTA_CAP};
pub use config::{load_app_config, load_app_config_from_env};
pub use cycle::{CycleContext, CycleStage, CycleSummary, StoreReport};
pub use products::{CatalogItem, ProductObservation, Snapshot};
pub use stores::{canonical_base_url, TrackedStore};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
