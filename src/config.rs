use anyhow::{Context, Result};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    // Runtime
    pub dev: bool,
    pub port: u16,

    // Database
    pub database_url: Option<String>,
    pub db_max_connections: u32,

    // Security
    pub api_key: Option<String>,

    // Messages
    pub default_language: String,

    // Pagination
    pub page_size: u64,
    pub max_page_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dev: false,
            port: 8080,
            database_url: None,
            db_max_connections: 5,
            api_key: None,
            default_language: "fa".to_string(),
            page_size: 10,
            max_page_size: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            // Runtime - DEV=True turns on open writes and debug logging
            dev: std::env::var("DEV").map(|v| parse_flag(&v)).unwrap_or(false),
            port: parse_var("PORT")?.unwrap_or(defaults.port),

            // Database - unset means the in-process store
            database_url: non_empty_var("DATABASE_URL"),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.db_max_connections),

            // Security
            api_key: non_empty_var("API_KEY"),

            // Messages
            default_language: non_empty_var("LANG_ERROR")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.default_language),

            // Pagination
            page_size: parse_var("PAGE_SIZE")?.unwrap_or(defaults.page_size),
            max_page_size: parse_var("MAX_PAGE_SIZE")?.unwrap_or(defaults.max_page_size),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.max_page_size == 0 {
            anyhow::bail!("PAGE_SIZE and MAX_PAGE_SIZE must be positive");
        }
        if self.page_size > self.max_page_size {
            anyhow::bail!(
                "PAGE_SIZE ({}) must not exceed MAX_PAGE_SIZE ({})",
                self.page_size,
                self.max_page_size
            );
        }
        Ok(())
    }
}

/// `True`, `true`, `1` and `yes` enable a flag; anything else disables it.
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    non_empty_var(key)
        .map(|v| v.parse::<T>().with_context(|| format!("{} is not valid: {:?}", key, v)))
        .transpose()
}
