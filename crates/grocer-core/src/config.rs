use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed or fails
/// validation.
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
/// Returns `ConfigError` if a value is present but cannot be parsed or fails
/// validation.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can use a `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let log_level = or_default("GROCER_LOG_LEVEL", "info");

    let datasets_dir = PathBuf::from(or_default("GROCER_DATASETS_DIR", "./datasets"));
    let scripts_dir = PathBuf::from(or_default("GROCER_SCRIPTS_DIR", "./scripts"));
    let images_dir = PathBuf::from(or_default("GROCER_IMAGES_DIR", "./images"));

    // 0 disables the cap.
    let max_pages = match parse_usize("GROCER_MAX_PAGES", "1")? {
        0 => None,
        n => Some(n),
    };

    let page_load_timeout_secs = parse_u64("GROCER_PAGE_LOAD_TIMEOUT_SECS", "10")?;

    let max_retries = parse_u32("GROCER_MAX_RETRIES", "2")?;
    if max_retries == 0 {
        return Err(invalid(
            "GROCER_MAX_RETRIES",
            "every page gets at least one retry; must be >= 1".to_string(),
        ));
    }
    let retry_backoff_base_ms = parse_u64("GROCER_RETRY_BACKOFF_BASE_MS", "500")?;

    let min_page_delay_ms = parse_u64("GROCER_MIN_PAGE_DELAY_MS", "1000")?;
    let max_page_delay_ms = parse_u64("GROCER_MAX_PAGE_DELAY_MS", "5000")?;
    if min_page_delay_ms > max_page_delay_ms {
        return Err(invalid(
            "GROCER_MIN_PAGE_DELAY_MS",
            format!("{min_page_delay_ms} exceeds GROCER_MAX_PAGE_DELAY_MS ({max_page_delay_ms})"),
        ));
    }

    let headless = parse_bool("GROCER_HEADLESS", &or_default("GROCER_HEADLESS", "true"))?;
    let chrome_path = lookup("GROCER_CHROME_PATH").ok().map(PathBuf::from);
    let user_agent = or_default("GROCER_USER_AGENT", DEFAULT_USER_AGENT);

    Ok(AppConfig {
        log_level,
        datasets_dir,
        scripts_dir,
        images_dir,
        max_pages,
        page_load_timeout_secs,
        max_retries,
        retry_backoff_base_ms,
        min_page_delay_ms,
        max_page_delay_ms,
        headless,
        chrome_path,
        user_agent,
    })
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
