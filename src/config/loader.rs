//! Load app definitions from disk and resolve them into a [`ModelSet`].

use crate::case::to_snake_case;
use crate::config::resolved::{FieldMeta, ModelMeta, ModelSet};
use crate::config::types::*;
use crate::config::validate_apps;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// File name looked up inside each app directory.
pub const MODELS_FILE: &str = "models.json";

#[derive(serde::Deserialize)]
struct ModelsFile {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    models: Vec<ModelConfig>,
}

/// Read `<dir>/<app>/models.json` for every app sub-directory, sorted by directory name.
/// Directories without a models file are skipped.
pub async fn load_apps_from_dir(dir: impl AsRef<Path>) -> Result<Vec<AppConfig>, ConfigError> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", dir.display(), e)))?;
    let mut app_dirs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))?
    {
        let path = entry.path();
        if path.is_dir() {
            app_dirs.push(path);
        }
    }
    app_dirs.sort();

    let mut apps = Vec::new();
    for path in app_dirs {
        let file = path.join(MODELS_FILE);
        let raw = match tokio::fs::read_to_string(&file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(ConfigError::Load(format!("{}: {}", file.display(), e))),
        };
        let parsed: ModelsFile = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))?;
        let label = parsed.label.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        tracing::debug!(app = %label, models = parsed.models.len(), "loaded app definition");
        apps.push(AppConfig {
            label,
            schema: parsed.schema.unwrap_or_else(|| "public".into()),
            models: parsed.models,
        });
    }
    Ok(apps)
}

/// Validate and resolve app definitions. Models without a primary key get an implicit `id` auto field.
pub fn resolve(apps: &[AppConfig]) -> Result<ModelSet, ConfigError> {
    validate_apps(apps)?;

    let mut models = Vec::new();
    let mut by_name = HashMap::new();
    for app in apps {
        for m in &app.models {
            let mut fields: Vec<FieldMeta> = Vec::with_capacity(m.fields.len() + 1);
            if !m.fields.iter().any(|f| f.primary_key) {
                fields.push(field_meta(&FieldConfig::new("id", FieldKind::Auto).primary_key()));
            }
            fields.extend(m.fields.iter().map(field_meta));
            let pk = fields
                .iter()
                .find(|f| f.primary_key)
                .map(|f| f.name.clone())
                .ok_or_else(|| ConfigError::InvalidField {
                    model: m.name.clone(),
                    field: "primary_key".into(),
                    reason: "no primary key".into(),
                })?;
            let table = m
                .table
                .clone()
                .unwrap_or_else(|| format!("{}_{}", to_snake_case(&app.label), to_snake_case(&m.name)));
            let meta = Arc::new(ModelMeta {
                name: m.name.clone(),
                app_label: app.label.clone(),
                schema_name: app.schema.clone(),
                table,
                fields,
                pk,
            });
            by_name.insert(meta.name.clone(), Arc::clone(&meta));
            models.push(meta);
        }
    }
    Ok(ModelSet { models, by_name })
}

fn field_meta(f: &FieldConfig) -> FieldMeta {
    let column = f.column.clone().unwrap_or_else(|| match f.kind {
        FieldKind::ForeignKey => format!("{}_id", f.name),
        _ => f.name.clone(),
    });
    FieldMeta {
        name: f.name.clone(),
        column,
        kind: f.kind,
        null: f.null,
        primary_key: f.primary_key,
        max_length: f.max_length,
        related_model: f.to.clone(),
        default: f.default.clone(),
    }
}
