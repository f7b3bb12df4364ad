//! Request/response schemas derived from model field metadata.

use crate::config::{FieldKind, ModelMeta};
use crate::error::ApiError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Row or payload keyed by field name.
pub type Record = Map<String, Value>;

/// Externally visible type of a schema field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    Integer,
    String,
    Boolean,
    /// List of strings.
    Array,
}

pub fn primitive_type(kind: FieldKind) -> PrimitiveType {
    match kind {
        FieldKind::Auto | FieldKind::Integer | FieldKind::ForeignKey => PrimitiveType::Integer,
        FieldKind::Boolean => PrimitiveType::Boolean,
        FieldKind::Char
        | FieldKind::Text
        | FieldKind::Date
        | FieldKind::DateTime
        | FieldKind::Decimal
        | FieldKind::Uuid
        | FieldKind::File => PrimitiveType::String,
        FieldKind::Files => PrimitiveType::Array,
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: PrimitiveType,
    #[serde(skip)]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

/// Build a schema from model fields. A field is optional when listed in `optional_fields`
/// or when the model allows null for it; otherwise it is required.
pub fn generate_schema(model: &ModelMeta, exclude: &[&str], optional_fields: &[&str]) -> Schema {
    let fields = model
        .fields
        .iter()
        .filter(|f| !exclude.contains(&f.name.as_str()))
        .map(|f| SchemaField {
            name: f.name.clone(),
            ty: primitive_type(f.kind),
            kind: f.kind,
            required: !(optional_fields.contains(&f.name.as_str()) || f.null),
            max_length: f.max_length,
        })
        .collect();
    Schema {
        name: format!("{}Schema", model.name),
        fields,
    }
}

impl Schema {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Project a stored row onto this schema's fields (missing values become null).
    pub fn serialize(&self, row: &Record) -> Value {
        let mut out = Map::with_capacity(self.fields.len());
        for f in &self.fields {
            out.insert(f.name.clone(), row.get(&f.name).cloned().unwrap_or(Value::Null));
        }
        Value::Object(out)
    }

    /// Validate a full payload: required fields must be present and non-null.
    /// Unknown keys are dropped; optional fields that are absent stay absent.
    pub fn validate(&self, payload: Value) -> Result<Record, ApiError> {
        self.check(payload, false)
    }

    /// Validate a partial payload (PATCH): absent fields are fine, even required ones.
    pub fn validate_partial(&self, payload: Value) -> Result<Record, ApiError> {
        self.check(payload, true)
    }

    fn check(&self, payload: Value, partial: bool) -> Result<Record, ApiError> {
        let Value::Object(mut body) = payload else {
            return Err(ApiError::Validation("payload must be a JSON object".into()));
        };
        let mut out = Record::new();
        let mut errors = Vec::new();
        for f in &self.fields {
            match body.remove(&f.name) {
                None => {
                    if f.required && !partial {
                        errors.push(format!("{}: field required", f.name));
                    }
                }
                Some(Value::Null) => {
                    if f.required {
                        errors.push(format!("{}: may not be null", f.name));
                    } else {
                        out.insert(f.name.clone(), Value::Null);
                    }
                }
                Some(v) => match coerce_field(f, v) {
                    Ok(v) => {
                        out.insert(f.name.clone(), v);
                    }
                    Err(msg) => errors.push(format!("{}: {}", f.name, msg)),
                },
            }
        }
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(ApiError::Validation(errors.join("; ")))
        }
    }
}

fn coerce_field(f: &SchemaField, v: Value) -> Result<Value, String> {
    match f.ty {
        PrimitiveType::Integer => match &v {
            Value::Number(n) if n.is_i64() => Ok(v),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| "value is not a valid integer".to_string()),
            _ => Err("value is not a valid integer".into()),
        },
        PrimitiveType::Boolean => match &v {
            Value::Bool(_) => Ok(v),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err("value is not a valid boolean".into()),
        },
        PrimitiveType::Array => match v {
            Value::Array(items) if items.iter().all(Value::is_string) => Ok(Value::Array(items)),
            _ => Err("value is not a valid list of strings".into()),
        },
        PrimitiveType::String => {
            let s = match v {
                Value::String(s) => s,
                Value::Number(n) if f.kind == FieldKind::Decimal => n.to_string(),
                _ => return Err("value is not a valid string".into()),
            };
            check_format(f.kind, &s)?;
            if let Some(max) = f.max_length {
                if s.chars().count() > max as usize {
                    return Err(format!("ensure this value has at most {} characters", max));
                }
            }
            Ok(Value::String(s))
        }
    }
}

/// Text formats enforced for date, datetime, uuid and decimal values. Other kinds accept any string.
pub(crate) fn check_format(kind: FieldKind, s: &str) -> Result<(), String> {
    match kind {
        FieldKind::Date => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| "value is not a valid date (YYYY-MM-DD)".into()),
        FieldKind::DateTime => {
            if chrono::DateTime::parse_from_rfc3339(s).is_ok()
                || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
            {
                Ok(())
            } else {
                Err("value is not a valid datetime".into())
            }
        }
        FieldKind::Uuid => uuid::Uuid::parse_str(s)
            .map(|_| ())
            .map_err(|_| "value is not a valid UUID".into()),
        FieldKind::Decimal => s
            .trim()
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| "value is not a valid decimal".into()),
        _ => Ok(()),
    }
}

/// The four schemas used by a model's routes.
#[derive(Clone, Debug)]
pub struct ModelSchemas {
    pub list: Schema,
    pub detail: Schema,
    pub create: Schema,
    pub update: Schema,
}

impl ModelSchemas {
    /// List and detail expose every field. Create omits an auto primary key and makes fields with
    /// defaults optional. Update omits the primary key and makes everything optional.
    pub fn for_model(model: &ModelMeta) -> Self {
        let auto_pk: Vec<&str> = model
            .fields
            .iter()
            .filter(|f| f.primary_key && f.kind == FieldKind::Auto)
            .map(|f| f.name.as_str())
            .collect();
        let with_default: Vec<&str> = model
            .fields
            .iter()
            .filter(|f| f.has_default())
            .map(|f| f.name.as_str())
            .collect();
        let all: Vec<&str> = model.fields.iter().map(|f| f.name.as_str()).collect();

        ModelSchemas {
            list: generate_schema(model, &[], &[]).named(format!("{}List", model.name)),
            detail: generate_schema(model, &[], &[]).named(format!("{}Detail", model.name)),
            create: generate_schema(model, &auto_pk, &with_default).named(format!("{}Create", model.name)),
            update: generate_schema(model, &[model.pk.as_str()], &all).named(format!("{}Update", model.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, AppConfig, FieldConfig, ModelConfig, ModelSet};
    use serde_json::json;

    fn models() -> ModelSet {
        resolve(&[AppConfig::new(
            "blog",
            vec![
                ModelConfig::new("Category", vec![FieldConfig::new("name", FieldKind::Text)]),
                ModelConfig::new(
                    "Post",
                    vec![
                        FieldConfig::new("title", FieldKind::Char).max_length(10),
                        FieldConfig::new("views", FieldKind::Integer).default_value(json!(0)),
                        FieldConfig::new("published", FieldKind::Boolean),
                        FieldConfig::new("published_on", FieldKind::Date).nullable(),
                        FieldConfig::new("category", FieldKind::ForeignKey)
                            .references("Category")
                            .nullable(),
                    ],
                ),
            ],
        )])
        .unwrap()
    }

    #[test]
    fn maps_field_kinds() {
        let set = models();
        let schema = generate_schema(set.get("Post").unwrap(), &[], &[]);
        let types: Vec<(&str, PrimitiveType)> = schema.fields.iter().map(|f| (f.name.as_str(), f.ty)).collect();
        assert_eq!(
            types,
            vec![
                ("id", PrimitiveType::Integer),
                ("title", PrimitiveType::String),
                ("views", PrimitiveType::Integer),
                ("published", PrimitiveType::Boolean),
                ("published_on", PrimitiveType::String),
                ("category", PrimitiveType::Integer),
            ]
        );
        assert_eq!(schema.name, "PostSchema");
    }

    #[test]
    fn optional_when_listed_or_nullable() {
        let set = models();
        let schema = generate_schema(set.get("Post").unwrap(), &["id"], &["title"]);
        assert!(schema.field("id").is_none());
        assert!(!schema.field("title").unwrap().required);
        assert!(!schema.field("published_on").unwrap().required);
        assert!(schema.field("published").unwrap().required);
    }

    #[test]
    fn validate_collects_errors() {
        let set = models();
        let schemas = ModelSchemas::for_model(set.get("Post").unwrap());
        let err = schemas
            .create
            .validate(json!({"title": "far too long a title", "published_on": "yesterday"}))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("title: ensure this value has at most 10 characters"), "{msg}");
        assert!(msg.contains("published: field required"), "{msg}");
        assert!(msg.contains("published_on: value is not a valid date"), "{msg}");
    }

    #[test]
    fn validate_coerces_and_drops_unknown() {
        let set = models();
        let schemas = ModelSchemas::for_model(set.get("Post").unwrap());
        let rec = schemas
            .create
            .validate(json!({"title": "Hi", "published": "true", "views": "3", "extra": 1}))
            .unwrap();
        assert_eq!(rec.get("published"), Some(&json!(true)));
        assert_eq!(rec.get("views"), Some(&json!(3)));
        assert!(!rec.contains_key("extra"));
        assert!(!rec.contains_key("category"));
    }

    #[test]
    fn partial_validation_allows_missing_fields() {
        let set = models();
        let schemas = ModelSchemas::for_model(set.get("Post").unwrap());
        let rec = schemas.update.validate_partial(json!({"views": 9})).unwrap();
        assert_eq!(rec.len(), 1);
        assert!(schemas.update.field("id").is_none());
        assert!(schemas.update.validate_partial(json!([1, 2])).is_err());
    }

    #[test]
    fn serialize_projects_fields() {
        let set = models();
        let schema = generate_schema(set.get("Category").unwrap(), &[], &[]);
        let mut row = Record::new();
        row.insert("id".into(), json!(1));
        row.insert("secret".into(), json!("x"));
        assert_eq!(schema.serialize(&row), json!({"id": 1, "name": null}));
    }
}
