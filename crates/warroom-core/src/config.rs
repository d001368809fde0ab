use std::str::FromStr;

use crate::app_config::{AppConfig, Environment, Language};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    let inference_api_key = require("GROQ_API_KEY")?;

    let env = parse_environment(&or_default("WARROOM_ENV", "development"))?;
    let log_level = or_default("WARROOM_LOG_LEVEL", "info");

    let db_max_connections = parse_var(&lookup, "WARROOM_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_var(&lookup, "WARROOM_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_var(&lookup, "WARROOM_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let cycle_interval_secs = parse_var(&lookup, "WARROOM_CYCLE_INTERVAL_SECS", "3600")?;
    if cycle_interval_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "WARROOM_CYCLE_INTERVAL_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    let max_concurrent_stores = parse_var(&lookup, "WARROOM_MAX_CONCURRENT_STORES", "1")?;
    let inter_store_delay_ms = parse_var(&lookup, "WARROOM_INTER_STORE_DELAY_MS", "3000")?;

    let fetch_timeout_secs = parse_var(&lookup, "WARROOM_FETCH_TIMEOUT_SECS", "15")?;
    let fetch_max_body_bytes = parse_var(&lookup, "WARROOM_FETCH_MAX_BODY_BYTES", "8388608")?;
    let fetch_page_size = parse_var(&lookup, "WARROOM_FETCH_PAGE_SIZE", "250")?;
    let fetch_max_pages = parse_var(&lookup, "WARROOM_FETCH_MAX_PAGES", "20")?;
    let fetch_user_agent = or_default(
        "WARROOM_FETCH_USER_AGENT",
        "warroom/0.1 (price-intelligence)",
    );
    let fetch_max_retries = parse_var(&lookup, "WARROOM_FETCH_MAX_RETRIES", "2")?;
    let fetch_retry_backoff_base_secs =
        parse_var(&lookup, "WARROOM_FETCH_RETRY_BACKOFF_BASE_SECS", "2")?;
    let default_currency = or_default("WARROOM_DEFAULT_CURRENCY", "USD").to_ascii_uppercase();

    let inference_base_url = or_default(
        "WARROOM_INFERENCE_BASE_URL",
        "https://api.groq.com/openai/v1",
    )
    .trim_end_matches('/')
    .to_string();
    let inference_model = or_default("WARROOM_INFERENCE_MODEL", "llama-3.3-70b-versatile");
    let inference_timeout_secs = parse_var(&lookup, "WARROOM_INFERENCE_TIMEOUT_SECS", "60")?;
    let inference_max_retries = parse_var(&lookup, "WARROOM_INFERENCE_MAX_RETRIES", "2")?;
    let inference_retry_backoff_base_ms =
        parse_var(&lookup, "WARROOM_INFERENCE_RETRY_BACKOFF_BASE_MS", "2000")?;
    let inference_temperature = parse_var(&lookup, "WARROOM_INFERENCE_TEMPERATURE", "0.1")?;
    let inference_max_tokens = parse_var(&lookup, "WARROOM_INFERENCE_MAX_TOKENS", "1200")?;
    let max_changes_per_prompt = parse_var(&lookup, "WARROOM_MAX_CHANGES_PER_PROMPT", "25")?;
    let analysis_language = parse_language(&or_default("WARROOM_ANALYSIS_LANGUAGE", "en"))?;

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        cycle_interval_secs,
        max_concurrent_stores,
        inter_store_delay_ms,
        fetch_timeout_secs,
        fetch_max_body_bytes,
        fetch_page_size,
        fetch_max_pages,
        fetch_user_agent,
        fetch_max_retries,
        fetch_retry_backoff_base_secs,
        default_currency,
        inference_api_key,
        inference_base_url,
        inference_model,
        inference_timeout_secs,
        inference_max_retries,
        inference_retry_backoff_base_ms,
        inference_temperature,
        inference_max_tokens,
        max_changes_per_prompt,
        analysis_language,
    })
}

/// Reads `var` (or `default` when unset) and parses it as `T`.
fn parse_var<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "WARROOM_ENV".to_string(),
            reason: format!("expected development, test, or production; got \"{other}\""),
        }),
    }
}

fn parse_language(s: &str) -> Result<Language, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "en" | "english" => Ok(Language::English),
        "es" | "spanish" => Ok(Language::Spanish),
        other => Err(ConfigError::InvalidEnvVar {
            var: "WARROOM_ANALYSIS_LANGUAGE".to_string(),
            reason: format!("expected en or es; got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
