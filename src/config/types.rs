//! Raw model definitions as declared in each app's `models.json`.

use serde::{Deserialize, Serialize};

/// Field type of a model column. Drives schema generation, query coercion and DDL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Auto-increment integer primary key.
    Auto,
    Char,
    Text,
    Integer,
    Boolean,
    Date,
    DateTime,
    ForeignKey,
    Decimal,
    Uuid,
    /// Uploaded file; stores the saved file name.
    File,
    /// Several uploaded files; stores a JSON array of saved names.
    Files,
}

impl FieldKind {
    /// Kinds whose values are stored and filtered as integers.
    pub fn is_integer_like(self) -> bool {
        matches!(self, FieldKind::Auto | FieldKind::Integer | FieldKind::ForeignKey)
    }

    pub fn is_file(self) -> bool {
        matches!(self, FieldKind::File | FieldKind::Files)
    }

    /// PostgreSQL type used for parameter casts.
    pub fn pg_type(self) -> &'static str {
        match self {
            FieldKind::Auto | FieldKind::Integer | FieldKind::ForeignKey => "bigint",
            FieldKind::Char | FieldKind::Text | FieldKind::File => "text",
            FieldKind::Files => "jsonb",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::DateTime => "timestamptz",
            FieldKind::Decimal => "numeric",
            FieldKind::Uuid => "uuid",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub null: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub max_length: Option<u32>,
    /// Target model name for foreign keys.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    /// Storage column; defaults to the field name (`<name>_id` for foreign keys).
    #[serde(default)]
    pub column: Option<String>,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldConfig {
            name: name.into(),
            kind,
            null: false,
            primary_key: false,
            max_length: None,
            to: None,
            default: None,
            column: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }

    pub fn references(mut self, model: impl Into<String>) -> Self {
        self.to = Some(model.into());
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    /// Table name; defaults to `<app>_<snake(name)>`.
    #[serde(default)]
    pub table: Option<String>,
    pub fields: Vec<FieldConfig>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, fields: Vec<FieldConfig>) -> Self {
        ModelConfig {
            name: name.into(),
            table: None,
            fields,
        }
    }
}

fn default_schema() -> String {
    "public".into()
}

/// One installed application: a label and the models it declares.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub label: String,
    /// PostgreSQL schema holding this app's tables.
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl AppConfig {
    pub fn new(label: impl Into<String>, models: Vec<ModelConfig>) -> Self {
        AppConfig {
            label: label.into(),
            schema: default_schema(),
            models,
        }
    }
}
