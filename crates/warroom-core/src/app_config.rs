#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Language the model is asked to write its text values in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
}

impl Language {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub cycle_interval_secs: u64,
    pub max_concurrent_stores: usize,
    pub inter_store_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub fetch_max_body_bytes: usize,
    pub fetch_page_size: u32,
    pub fetch_max_pages: usize,
    pub fetch_user_agent: String,
    pub fetch_max_retries: u32,
    pub fetch_retry_backoff_base_secs: u64,
    pub default_currency: String,
    pub inference_api_key: String,
    pub inference_base_url: String,
    pub inference_model: String,
    pub inference_timeout_secs: u64,
    pub inference_max_retries: u32,
    pub inference_retry_backoff_base_ms: u64,
    pub inference_temperature: f32,
    pub inference_max_tokens: u32,
    pub max_changes_per_prompt: usize,
    pub analysis_language: Language,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("cycle_interval_secs", &self.cycle_interval_secs)
            .field("max_concurrent_stores", &self.max_concurrent_stores)
            .field("inter_store_delay_ms", &self.inter_store_delay_ms)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("fetch_max_body_bytes", &self.fetch_max_body_bytes)
            .field("fetch_page_size", &self.fetch_page_size)
            .field("fetch_max_pages", &self.fetch_max_pages)
            .field("fetch_user_agent", &self.fetch_user_agent)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field(
                "fetch_retry_backoff_base_secs",
                &self.fetch_retry_backoff_base_secs,
            )
            .field("default_currency", &self.default_currency)
            .field("inference_api_key", &"[redacted]")
            .field("inference_base_url", &self.inference_base_url)
            .field("inference_model", &self.inference_model)
            .field("inference_timeout_secs", &self.inference_timeout_secs)
            .field("inference_max_retries", &self.inference_max_retries)
            .field(
                "inference_retry_backoff_base_ms",
                &self.inference_retry_backoff_base_ms,
            )
            .field("inference_temperature", &self.inference_temperature)
            .field("inference_max_tokens", &self.inference_max_tokens)
            .field("max_changes_per_prompt", &self.max_changes_per_prompt)
            .field("analysis_language", &self.analysis_language)
            .finish()
    }
}
