//! Resolved model metadata: definitions validated and flattened for runtime use.

use crate::config::FieldKind;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct FieldMeta {
    pub name: String,
    /// Storage column (differs from `name` for foreign keys).
    pub column: String,
    pub kind: FieldKind,
    pub null: bool,
    pub primary_key: bool,
    pub max_length: Option<u32>,
    pub related_model: Option<String>,
    pub default: Option<Value>,
}

impl FieldMeta {
    /// Whether the store fills the value when the payload omits it.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.kind == FieldKind::Auto
    }
}

#[derive(Clone, Debug)]
pub struct ModelMeta {
    pub name: String,
    pub app_label: String,
    pub schema_name: String,
    pub table: String,
    pub fields: Vec<FieldMeta>,
    /// Primary key field name.
    pub pk: String,
}

impl ModelMeta {
    pub fn get_field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn pk_field(&self) -> &FieldMeta {
        self.get_field(&self.pk)
            .unwrap_or_else(|| &self.fields[0])
    }

    /// Whether `id` has the right shape to ever match this model's primary key.
    pub fn pk_accepts(&self, id: &Value) -> bool {
        let pk = self.pk_field();
        match pk.kind {
            k if k.is_integer_like() => id.is_i64(),
            FieldKind::Uuid => id
                .as_str()
                .map(|s| uuid::Uuid::parse_str(s).is_ok())
                .unwrap_or(false),
            _ => !id.is_null(),
        }
    }
}

/// All resolved models, addressable by name.
#[derive(Clone, Debug, Default)]
pub struct ModelSet {
    pub models: Vec<Arc<ModelMeta>>,
    pub by_name: HashMap<String, Arc<ModelMeta>>,
}

impl ModelSet {
    pub fn get(&self, name: &str) -> Option<&Arc<ModelMeta>> {
        self.by_name.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModelMeta>> {
        self.models.iter()
    }
}

/// Parse a path id for `model`: integer keys parse numeric strings, everything else stays a string.
pub fn parse_model_id(model: &ModelMeta, raw: &str) -> Value {
    if model.pk_field().kind.is_integer_like() {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    Value::String(raw.to_string())
}
