//! Persistence backends. Handlers only see the [`Store`] trait.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::ModelMeta;
use crate::error::ApiError;
use crate::query::{ListQuery, PageWindow};
use crate::schema::Record;
use async_trait::async_trait;
use serde_json::Value;

/// One page of a list query plus the total number of matching rows.
#[derive(Clone, Debug, Default)]
pub struct PageResult {
    pub count: u64,
    pub rows: Vec<Record>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Filter, sort and window rows. `count` is the total before windowing.
    async fn list(&self, model: &ModelMeta, query: &ListQuery, window: PageWindow) -> Result<PageResult, ApiError>;

    async fn get(&self, model: &ModelMeta, id: &Value) -> Result<Option<Record>, ApiError>;

    /// Insert a row built from validated `data`; omitted fields take their defaults.
    async fn create(&self, model: &ModelMeta, data: &Record) -> Result<Record, ApiError>;

    /// Set the fields present in `data`. `None` if no row has `id`.
    async fn update(&self, model: &ModelMeta, id: &Value, data: &Record) -> Result<Option<Record>, ApiError>;

    /// Delete by id. `false` if no row had `id`.
    async fn delete(&self, model: &ModelMeta, id: &Value) -> Result<bool, ApiError>;

    /// Readiness check.
    async fn ping(&self) -> Result<(), ApiError>;
}
