//! Builds parameterized SELECT, COUNT, INSERT, UPDATE and DELETE from resolved model metadata.

use crate::config::{FieldKind, FieldMeta, ModelMeta};
use crate::query::{FilterOp, ListQuery, PageWindow, MAX_OFFSET};
use crate::schema::Record;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(model: &ModelMeta) -> String {
    format!("{}.{}", quoted(&model.schema_name), quoted(&model.table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder cast to the field's type.
    fn push_typed(&mut self, field: &FieldMeta, v: Value) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), field.kind.pg_type())
    }

    fn push_text(&mut self, v: String) -> String {
        self.params.push(Value::String(v));
        format!("${}", self.params.len())
    }
}

/// SELECT list: every column aliased to its field name; numeric as text so values survive the round trip.
fn select_column_list(model: &ModelMeta) -> String {
    model
        .fields
        .iter()
        .map(|f| {
            let col = quoted(&f.column);
            let expr = if f.kind == FieldKind::Decimal {
                format!("{}::text", col)
            } else {
                col
            };
            format!("{} AS {}", expr, quoted(&f.name))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn where_clause(model: &ModelMeta, query: &ListQuery, q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for filter in &query.filters {
        let Some(field) = model.get_field(&filter.field) else {
            continue;
        };
        let col = quoted(&field.column);
        let part = match filter.op {
            FilterOp::Contains => {
                let needle = match &filter.value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let ph = q.push_text(format!("%{}%", escape_like(&needle)));
                format!("{}::text ILIKE {}", col, ph)
            }
            FilterOp::Eq => format!("{} = {}", col, q.push_typed(field, filter.value.clone())),
            FilterOp::Gt => format!("{} > {}", col, q.push_typed(field, filter.value.clone())),
            FilterOp::Lt => format!("{} < {}", col, q.push_typed(field, filter.value.clone())),
        };
        parts.push(part);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn pk_column(model: &ModelMeta) -> String {
    quoted(&model.pk_field().column)
}

/// SELECT page: filters, ORDER BY the sort field (then pk) or pk alone, LIMIT/OFFSET.
pub fn select_list(model: &ModelMeta, query: &ListQuery, window: PageWindow) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(model, query, &mut q);
    let pk = pk_column(model);
    let order = match query.sort.as_ref().and_then(|s| model.get_field(&s.field).map(|f| (f, s.descending))) {
        Some((f, desc)) if !f.primary_key => format!(
            " ORDER BY {} {}, {}",
            quoted(&f.column),
            if desc { "DESC" } else { "ASC" },
            pk
        ),
        Some((_, true)) => format!(" ORDER BY {} DESC", pk),
        _ => format!(" ORDER BY {}", pk),
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(model),
        qualified_table(model),
        where_sql,
        order,
        window.limit,
        window.offset.min(MAX_OFFSET)
    );
    q
}

/// COUNT(*) with the same filters as [`select_list`].
pub fn count(model: &ModelMeta, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(model, query, &mut q);
    q.sql = format!("SELECT COUNT(*) AS \"count\" FROM {}{}", qualified_table(model), where_sql);
    q
}

/// SELECT by primary key.
pub fn select_by_id(model: &ModelMeta, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_typed(model.pk_field(), id.clone());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(model),
        qualified_table(model),
        pk_column(model),
        ph
    );
    q
}

/// INSERT: provided values, else field defaults, else NULL. Auto keys are left to the sequence.
pub fn insert(model: &ModelMeta, data: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &model.fields {
        let value = match data.get(&f.name) {
            Some(v) => v.clone(),
            None if f.kind == FieldKind::Auto => continue,
            None => f.default.clone().unwrap_or(Value::Null),
        };
        cols.push(quoted(&f.column));
        placeholders.push(q.push_typed(f, value));
    }
    let table = qualified_table(model);
    let returning = select_column_list(model);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only known, non-key fields present in `data`. With nothing to set this is a plain SELECT.
pub fn update(model: &ModelMeta, id: &Value, data: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in model.fields.iter().filter(|f| !f.primary_key) {
        if let Some(v) = data.get(&f.name) {
            let ph = q.push_typed(f, v.clone());
            sets.push(format!("{} = {}", quoted(&f.column), ph));
        }
    }
    if sets.is_empty() {
        return select_by_id(model, id);
    }
    let id_ph = q.push_typed(model.pk_field(), id.clone());
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(model),
        sets.join(", "),
        pk_column(model),
        id_ph,
        select_column_list(model)
    );
    q
}

/// DELETE by id.
pub fn delete(model: &ModelMeta, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_typed(model.pk_field(), id.clone());
    q.sql = format!("DELETE FROM {} WHERE {} = {}", qualified_table(model), pk_column(model), ph);
    q
}
