//! In-process store. Rows live in insertion order per model; nothing is persisted.

use super::{PageResult, Store};
use crate::config::{FieldKind, FieldMeta, ModelMeta};
use crate::error::ApiError;
use crate::query::{Filter, FilterOp, ListQuery, PageWindow};
use crate::schema::Record;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Table {
    pk: String,
    rows: Vec<Record>,
    last_id: i64,
}

impl Table {
    fn position(&self, id: &Value) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.get(&self.pk).map(|v| values_equal(v, id)).unwrap_or(false))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort order with nulls after everything else (as PostgreSQL does for ascending order).
fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
    }
}

fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(row: &Record, filter: &Filter) -> bool {
    let Some(v) = row.get(&filter.field) else {
        return false;
    };
    match filter.op {
        FilterOp::Eq => values_equal(v, &filter.value),
        FilterOp::Contains => match (text_of(v), text_of(&filter.value)) {
            (Some(hay), Some(needle)) => hay.to_lowercase().contains(&needle.to_lowercase()),
            _ => false,
        },
        FilterOp::Gt => compare(v, &filter.value) == Some(Ordering::Greater),
        FilterOp::Lt => compare(v, &filter.value) == Some(Ordering::Less),
    }
}

fn check_value(
    tables: &HashMap<String, Table>,
    model: &ModelMeta,
    field: &FieldMeta,
    value: &Value,
) -> Result<(), ApiError> {
    if value.is_null() {
        if !field.null {
            return Err(ApiError::Validation(format!("{}: may not be null", field.name)));
        }
        return Ok(());
    }
    if field.kind == FieldKind::ForeignKey {
        let target = field.related_model.as_deref().unwrap_or_default();
        let exists = tables
            .get(target)
            .map(|t| t.position(value).is_some())
            .unwrap_or(false);
        if !exists {
            return Err(ApiError::Validation(format!(
                "{}.{}: {} with id {} does not exist",
                model.name, field.name, target, value
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn list(&self, model: &ModelMeta, query: &ListQuery, window: PageWindow) -> Result<PageResult, ApiError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&model.name) else {
            return Ok(PageResult::default());
        };
        let mut rows: Vec<&Record> = table
            .rows
            .iter()
            .filter(|r| query.filters.iter().all(|f| matches(r, f)))
            .collect();
        if let Some(sort) = &query.sort {
            rows.sort_by(|a, b| {
                let ord = sort_cmp(a.get(&sort.field), b.get(&sort.field));
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        let count = rows.len() as u64;
        let rows = rows
            .into_iter()
            .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
            .take(window.limit as usize)
            .cloned()
            .collect();
        Ok(PageResult { count, rows })
    }

    async fn get(&self, model: &ModelMeta, id: &Value) -> Result<Option<Record>, ApiError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&model.name)
            .and_then(|t| t.position(id).map(|i| t.rows[i].clone())))
    }

    async fn create(&self, model: &ModelMeta, data: &Record) -> Result<Record, ApiError> {
        let mut tables = self.tables.write().await;
        let mut row = Record::new();
        let mut next_id = None;
        {
            let last_id = tables.get(&model.name).map(|t| t.last_id).unwrap_or(0);
            for f in &model.fields {
                let value = match data.get(&f.name) {
                    Some(v) => v.clone(),
                    None if f.kind == FieldKind::Auto => {
                        next_id = Some(last_id + 1);
                        Value::Number((last_id + 1).into())
                    }
                    None => f.default.clone().unwrap_or(Value::Null),
                };
                if !f.primary_key {
                    check_value(&tables, model, f, &value)?;
                }
                row.insert(f.name.clone(), value);
            }
        }

        let table = tables.entry(model.name.clone()).or_insert_with(|| Table {
            pk: model.pk.clone(),
            ..Table::default()
        });
        let id = row.get(&model.pk).cloned().unwrap_or(Value::Null);
        if id.is_null() {
            return Err(ApiError::Validation(format!("{}: may not be null", model.pk)));
        }
        if table.position(&id).is_some() {
            return Err(ApiError::Validation(format!(
                "{} with {} {} already exists",
                model.name, model.pk, id
            )));
        }
        match next_id {
            Some(n) => table.last_id = n,
            None => {
                if let Some(n) = id.as_i64() {
                    table.last_id = table.last_id.max(n);
                }
            }
        }
        table.rows.push(row.clone());
        tracing::debug!(model = %model.name, id = %id, "memory insert");
        Ok(row)
    }

    async fn update(&self, model: &ModelMeta, id: &Value, data: &Record) -> Result<Option<Record>, ApiError> {
        let mut tables = self.tables.write().await;
        for (k, v) in data {
            if let Some(f) = model.get_field(k).filter(|f| !f.primary_key) {
                check_value(&tables, model, f, v)?;
            }
        }
        let Some(table) = tables.get_mut(&model.name) else {
            return Ok(None);
        };
        let Some(i) = table.position(id) else {
            return Ok(None);
        };
        let row = &mut table.rows[i];
        for (k, v) in data {
            if model.get_field(k).map(|f| !f.primary_key).unwrap_or(false) {
                row.insert(k.clone(), v.clone());
            }
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, model: &ModelMeta, id: &Value) -> Result<bool, ApiError> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&model.name) else {
            return Ok(false);
        };
        match table.position(id) {
            Some(i) => {
                table.rows.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), ApiError> {
        Ok(())
    }
}
