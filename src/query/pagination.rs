//! Pagination strategies: limit/offset and page number. Both answer `{count, items}`.

use crate::error::{ApiError, ConfigError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaginationStrategy {
    #[default]
    LimitOffset,
    PageNumber,
}

impl FromStr for PaginationStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "limit-offset" => Ok(PaginationStrategy::LimitOffset),
            "page-number" => Ok(PaginationStrategy::PageNumber),
            _ => Err(ConfigError::UnknownPagination(s.to_string())),
        }
    }
}

impl fmt::Display for PaginationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaginationStrategy::LimitOffset => "limit-offset",
            PaginationStrategy::PageNumber => "page-number",
        })
    }
}

/// Largest offset PostgreSQL accepts (`OFFSET` is a bigint).
pub const MAX_OFFSET: u64 = i64::MAX as u64;

/// Rows to fetch after filtering and sorting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u32,
    pub offset: u64,
}

/// Page sizes used when resolving a window.
#[derive(Clone, Copy, Debug)]
pub struct PageLimits {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        PageLimits {
            default_size: crate::settings::DEFAULT_PAGE_SIZE,
            max_size: crate::settings::DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

fn param<T: FromStr>(params: &HashMap<String, String>, key: &str) -> Result<Option<T>, ApiError> {
    match params.get(key) {
        None => Ok(None),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("{key}: value is not a valid non-negative integer"))),
    }
}

impl PaginationStrategy {
    /// Query parameters this strategy reads.
    pub fn params(self) -> &'static [&'static str] {
        match self {
            PaginationStrategy::LimitOffset => &["limit", "offset"],
            PaginationStrategy::PageNumber => &["page", "page_size"],
        }
    }

    pub fn window(self, params: &HashMap<String, String>, limits: PageLimits) -> Result<PageWindow, ApiError> {
        let size_key = match self {
            PaginationStrategy::LimitOffset => "limit",
            PaginationStrategy::PageNumber => "page_size",
        };
        let size = param::<u32>(params, size_key)?.unwrap_or(limits.default_size);
        if size == 0 {
            return Err(ApiError::Validation(format!("{size_key}: must be at least 1")));
        }
        let limit = size.min(limits.max_size);
        let offset = match self {
            PaginationStrategy::LimitOffset => param::<u64>(params, "offset")?.unwrap_or(0),
            PaginationStrategy::PageNumber => {
                let page = param::<u64>(params, "page")?.unwrap_or(1);
                if page == 0 {
                    return Err(ApiError::Validation("page: must be at least 1".into()));
                }
                (page - 1)
                    .checked_mul(u64::from(limit))
                    .ok_or_else(|| ApiError::Validation("page: out of range".into()))?
            }
        };
        Ok(PageWindow {
            limit,
            offset: offset.min(MAX_OFFSET),
        })
    }
}
