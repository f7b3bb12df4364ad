//! Translate list query parameters into store-agnostic filters and sort.

use crate::config::{FieldKind, FieldMeta, ModelMeta};
use crate::error::ApiError;
use crate::schema::check_format;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Query parameters consumed by the list endpoint itself; never treated as field filters.
pub const RESERVED_PARAMS: &[&str] = &["q", "sort", "order", "limit", "offset", "page", "page_size"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FilterOp {
    Eq,
    /// Case-insensitive substring match.
    Contains,
    Gt,
    Lt,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Filter {
            field: field.into(),
            op,
            value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

/// Filters and ordering for a list request. Handed to `pre_list` hooks before the store runs it.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
}

impl ListQuery {
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

fn query_param_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*([=<>])\s*(\S.*?)\s*$").expect("static regex")
    })
}

fn number_value(s: &str) -> Option<Value> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(Value::Number(n.into()));
    }
    s.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number)
}

/// Decode a structured free-text query: `field=value`, `field>value` or `field<value`.
/// Equality on booleans and integers is exact; other equality becomes a substring match.
/// Input that is not one of these forms yields no filters.
pub fn parse_query_param(q: &str) -> Vec<Filter> {
    let Some(caps) = query_param_re().captures(q) else {
        return Vec::new();
    };
    let field = caps[1].to_string();
    let raw = &caps[3];
    let filter = match &caps[2] {
        "=" => {
            if raw.eq_ignore_ascii_case("true") {
                Filter::new(field, FilterOp::Eq, Value::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Filter::new(field, FilterOp::Eq, Value::Bool(false))
            } else if let Ok(n) = raw.parse::<i64>() {
                Filter::new(field, FilterOp::Eq, Value::Number(n.into()))
            } else {
                Filter::new(field, FilterOp::Contains, Value::String(raw.to_string()))
            }
        }
        op => {
            let value = number_value(raw).unwrap_or_else(|| Value::String(raw.to_string()));
            let op = if op == ">" { FilterOp::Gt } else { FilterOp::Lt };
            Filter::new(field, op, value)
        }
    };
    vec![filter]
}

/// Coerce a decoded filter value to the field's storage type. `None` when it cannot apply.
fn coerce_for_field(field: &FieldMeta, value: Value) -> Option<Value> {
    match (field.kind, value) {
        (FieldKind::Files, _) => None,
        (k, Value::Number(n)) if k.is_integer_like() => n.as_i64().map(|i| Value::Number(i.into())),
        (k, Value::String(s)) if k.is_integer_like() => s.parse::<i64>().ok().map(|i| Value::Number(i.into())),
        (k, Value::Bool(_)) if k.is_integer_like() => None,
        (FieldKind::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (FieldKind::Boolean, _) => None,
        (FieldKind::Decimal, Value::Number(n)) => Some(Value::Number(n)),
        (_, Value::Number(n)) => Some(Value::String(n.to_string())),
        (_, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (_, v) => Some(v),
    }
}

/// Equality value for a `field=value` query parameter, typed by the field kind.
fn keyword_value(field: &FieldMeta, raw: &str) -> Result<Value, ApiError> {
    if field.kind.is_integer_like() {
        return raw
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| ApiError::Validation(format!("Invalid value for integer field '{}'", field.name)));
    }
    if field.kind == FieldKind::Boolean {
        return match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(ApiError::Validation(format!(
                "Invalid value for boolean field '{}'",
                field.name
            ))),
        };
    }
    let value = Value::String(raw.to_string());
    check_filter_value(field, FilterOp::Eq, &value)?;
    Ok(value)
}

fn format_label(kind: FieldKind) -> Option<&'static str> {
    match kind {
        FieldKind::Date => Some("date"),
        FieldKind::DateTime => Some("datetime"),
        FieldKind::Uuid => Some("uuid"),
        FieldKind::Decimal => Some("decimal"),
        _ => None,
    }
}

/// Comparison values for typed text columns must parse; substring matches are free-form.
fn check_filter_value(field: &FieldMeta, op: FilterOp, value: &Value) -> Result<(), ApiError> {
    let (Some(label), Value::String(s)) = (format_label(field.kind), value) else {
        return Ok(());
    };
    if op == FilterOp::Contains {
        return Ok(());
    }
    check_format(field.kind, s)
        .map_err(|_| ApiError::Validation(format!("Invalid value for {} field '{}'", label, field.name)))
}

/// Build the list query from request parameters.
///
/// - `q`: structured filters (see [`parse_query_param`]) on existing fields; when none apply,
///   a substring match against `search_field` if the model has it.
/// - any other non-reserved parameter naming a field: typed equality. Unknown names and
///   multi-file fields are ignored.
/// - values for date, datetime, uuid and decimal comparisons must parse, or the request is rejected.
/// - `sort` / `order`: single-field ordering; an unknown sort field leaves the order unchanged.
pub fn apply_filters(
    model: &ModelMeta,
    search_field: Option<&str>,
    params: &HashMap<String, String>,
) -> Result<ListQuery, ApiError> {
    let mut query = ListQuery::default();

    if let Some(q) = params.get("q").filter(|q| !q.trim().is_empty()) {
        let mut structured = Vec::new();
        for f in parse_query_param(q) {
            let Some(field) = model.get_field(&f.field) else {
                continue;
            };
            let Some(value) = coerce_for_field(field, f.value) else {
                continue;
            };
            check_filter_value(field, f.op, &value)?;
            structured.push(Filter { value, ..f });
        }
        if !structured.is_empty() {
            query.filters.extend(structured);
        } else if let Some(search) = search_field.and_then(|s| model.get_field(s)) {
            query
                .filters
                .push(Filter::new(&search.name, FilterOp::Contains, Value::String(q.clone())));
        }
    }

    let mut keyword_names: Vec<&String> = params
        .keys()
        .filter(|k| !RESERVED_PARAMS.contains(&k.as_str()))
        .collect();
    keyword_names.sort();
    for name in keyword_names {
        let Some(field) = model.get_field(name).filter(|f| f.kind != FieldKind::Files) else {
            continue;
        };
        let value = keyword_value(field, &params[name])?;
        query.filters.push(Filter::new(&field.name, FilterOp::Eq, value));
    }

    if let Some(sort) = params.get("sort") {
        if model.get_field(sort).is_some() {
            let descending = params
                .get("order")
                .map(|o| o.eq_ignore_ascii_case("desc"))
                .unwrap_or(false);
            query.sort = Some(Sort {
                field: sort.clone(),
                descending,
            });
        }
    }

    Ok(query)
}
