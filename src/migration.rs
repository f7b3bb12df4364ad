//! Create tables for resolved models: schemas first, then tables, then foreign keys.

use crate::config::{FieldKind, FieldMeta, ModelMeta, ModelSet};
use crate::error::ApiError;
use crate::sql::{qualified_table, quoted};
use serde_json::Value;
use sqlx::PgPool;

fn literal(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "TRUE".into() } else { "FALSE".into() }),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        other => Some(format!("'{}'", other.to_string().replace('\'', "''"))),
    }
}

fn column_type(field: &FieldMeta, models: &ModelSet) -> String {
    match field.kind {
        FieldKind::Auto => "BIGSERIAL".into(),
        FieldKind::Char | FieldKind::File => match field.max_length {
            Some(n) => format!("VARCHAR({})", n),
            None => "TEXT".into(),
        },
        FieldKind::Text => "TEXT".into(),
        FieldKind::Integer => "BIGINT".into(),
        FieldKind::Boolean => "BOOLEAN".into(),
        FieldKind::Date => "DATE".into(),
        FieldKind::DateTime => "TIMESTAMPTZ".into(),
        FieldKind::Decimal => "NUMERIC".into(),
        FieldKind::Uuid => "UUID".into(),
        FieldKind::Files => "JSONB".into(),
        FieldKind::ForeignKey => {
            let target_pk = field
                .related_model
                .as_deref()
                .and_then(|m| models.get(m))
                .map(|m| m.pk_field().kind);
            match target_pk {
                Some(FieldKind::Uuid) => "UUID".into(),
                Some(FieldKind::Char) | Some(FieldKind::Text) => "TEXT".into(),
                _ => "BIGINT".into(),
            }
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` for one model. Foreign key constraints are added separately.
pub fn create_table_sql(model: &ModelMeta, models: &ModelSet) -> String {
    let mut defs: Vec<String> = Vec::new();
    for f in &model.fields {
        let mut def = format!("{} {}", quoted(&f.column), column_type(f, models));
        if !f.null && !f.primary_key {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = f.default.as_ref().and_then(literal) {
            def.push_str(" DEFAULT ");
            def.push_str(&d);
        }
        defs.push(def);
    }
    defs.push(format!("PRIMARY KEY ({})", quoted(&model.pk_field().column)));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(model),
        defs.join(",\n  ")
    )
}

/// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY` for each foreign key field of `model`.
pub fn foreign_key_sql(model: &ModelMeta, models: &ModelSet) -> Vec<String> {
    model
        .fields
        .iter()
        .filter(|f| f.kind == FieldKind::ForeignKey)
        .filter_map(|f| {
            let target = models.get(f.related_model.as_deref()?)?;
            Some(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                qualified_table(model),
                quoted(&format!("{}_{}_fk", model.table, f.column)),
                quoted(&f.column),
                qualified_table(target),
                quoted(&target.pk_field().column)
            ))
        })
        .collect()
}

/// Create every schema and table in `models`. Idempotent; a foreign key that already exists is logged and skipped.
pub async fn apply_migrations(pool: &PgPool, models: &ModelSet) -> Result<(), ApiError> {
    let mut schemas: Vec<&str> = models.iter().map(|m| m.schema_name.as_str()).collect();
    schemas.sort_unstable();
    schemas.dedup();
    for s in schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(s)))
            .execute(pool)
            .await?;
    }

    for m in models.iter() {
        let sql = create_table_sql(m, models);
        tracing::debug!(model = %m.name, sql = %sql, "create table");
        sqlx::query(&sql).execute(pool).await?;
    }

    for m in models.iter() {
        for sql in foreign_key_sql(m, models) {
            if let Err(e) = sqlx::query(&sql).execute(pool).await {
                tracing::warn!(model = %m.name, error = %e, "foreign key not added");
            }
        }
    }
    tracing::info!(models = models.models.len(), "migrations applied");
    Ok(())
}
