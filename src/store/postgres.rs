//! PostgreSQL store: runs the SQL from [`crate::sql`] on a connection pool.

use super::{PageResult, Store};
use crate::config::ModelMeta;
use crate::error::ApiError;
use crate::query::{ListQuery, PageWindow};
use crate::schema::Record;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn bind(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }

    async fn query_many(&self, q: &QueryBuf) -> Result<Vec<Record>, ApiError> {
        let rows = Self::bind(q).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn query_one(&self, q: &QueryBuf) -> Result<Option<Record>, ApiError> {
        let row = Self::bind(q).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_record))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list(&self, model: &ModelMeta, query: &ListQuery, window: PageWindow) -> Result<PageResult, ApiError> {
        let count_q = sql::count(model, query);
        let count: i64 = {
            use sqlx::Row;
            Self::bind(&count_q).fetch_one(&self.pool).await?.try_get("count")?
        };
        let rows = self.query_many(&sql::select_list(model, query, window)).await?;
        Ok(PageResult {
            count: u64::try_from(count).unwrap_or_default(),
            rows,
        })
    }

    async fn get(&self, model: &ModelMeta, id: &Value) -> Result<Option<Record>, ApiError> {
        self.query_one(&sql::select_by_id(model, id)).await
    }

    async fn create(&self, model: &ModelMeta, data: &Record) -> Result<Record, ApiError> {
        self.query_one(&sql::insert(model, data))
            .await?
            .ok_or(ApiError::DatabaseOperation(sqlx::Error::RowNotFound))
    }

    async fn update(&self, model: &ModelMeta, id: &Value, data: &Record) -> Result<Option<Record>, ApiError> {
        self.query_one(&sql::update(model, id, data)).await
    }

    async fn delete(&self, model: &ModelMeta, id: &Value) -> Result<bool, ApiError> {
        let done = Self::bind(&sql::delete(model, id)).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), ApiError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn row_to_record(row: &PgRow) -> Record {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(v)) = row.try_get::<Option<Value>, _>(name) {
        return v;
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    Value::Null
}
