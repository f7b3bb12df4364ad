//! Process settings from environment variables (after loading `.env`).

use crate::error::ConfigError;
use crate::query::PaginationStrategy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: Option<String>,
    pub bind_addr: String,
    /// Verbose error bodies and logs for server errors.
    pub debug: bool,
    pub pagination: PaginationStrategy,
    pub page_size: u32,
    pub max_page_size: u32,
    /// Directory of app definitions (`<app>/models.json`).
    pub apps_path: Option<PathBuf>,
    pub body_limit: usize,
    /// Directory receiving uploaded files.
    pub media_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: None,
            bind_addr: "0.0.0.0:3000".into(),
            debug: false,
            pagination: PaginationStrategy::LimitOffset,
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            apps_path: None,
            body_limit: DEFAULT_BODY_LIMIT,
            media_root: PathBuf::from(crate::upload::DEFAULT_MEDIA_ROOT),
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read `DATABASE_URL` and `MODEL_REST_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Settings::default();
        s.database_url = lookup("DATABASE_URL");
        if let Some(v) = lookup("MODEL_REST_BIND") {
            s.bind_addr = v;
        }
        if let Some(v) = lookup("MODEL_REST_DEBUG") {
            s.debug = parse_bool("MODEL_REST_DEBUG", &v)?;
        }
        if let Some(v) = lookup("MODEL_REST_PAGINATION") {
            s.pagination = v.parse()?;
        }
        if let Some(v) = lookup("MODEL_REST_PAGE_SIZE") {
            s.page_size = parse_positive("MODEL_REST_PAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("MODEL_REST_MAX_PAGE_SIZE") {
            s.max_page_size = parse_positive("MODEL_REST_MAX_PAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("MODEL_REST_APPS_PATH") {
            s.apps_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MODEL_REST_BODY_LIMIT") {
            s.body_limit = v.parse().map_err(|_| ConfigError::InvalidSetting {
                key: "MODEL_REST_BODY_LIMIT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("MODEL_REST_MEDIA_ROOT") {
            s.media_root = PathBuf::from(v);
        }
        if s.page_size > s.max_page_size {
            s.page_size = s.max_page_size;
        }
        Ok(s)
    }

    /// Make these settings process-wide where they are read globally (debug error bodies).
    pub fn apply(&self) {
        crate::error::set_debug(self.debug);
    }
}

fn parse_bool(key: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidSetting {
            key,
            value: v.to_string(),
        }),
    }
}

fn parse_positive(key: &'static str, v: &str) -> Result<u32, ConfigError> {
    match v.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidSetting {
            key,
            value: v.to_string(),
        }),
    }
}

/// Install the fmt subscriber with `RUST_LOG`, falling back to `default_directive` (e.g. "model_rest=info").
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
