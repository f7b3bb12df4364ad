//! Model definition validation: uniqueness, primary keys and foreign key references.

use crate::config::{AppConfig, FieldKind};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate_apps(apps: &[AppConfig]) -> Result<(), ConfigError> {
    let mut labels = HashSet::new();
    let mut model_names = HashSet::new();
    for app in apps {
        if !labels.insert(app.label.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "app label",
                name: app.label.clone(),
            });
        }
        for m in &app.models {
            if !model_names.insert(m.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "model",
                    name: m.name.clone(),
                });
            }
        }
    }

    for app in apps {
        for m in &app.models {
            let mut field_names = HashSet::new();
            let mut pk_count = 0;
            for f in &m.fields {
                if !field_names.insert(f.name.as_str()) {
                    return Err(ConfigError::Duplicate {
                        kind: "field",
                        name: format!("{}.{}", m.name, f.name),
                    });
                }
                if f.primary_key {
                    pk_count += 1;
                }
                let invalid = |reason: &str| ConfigError::InvalidField {
                    model: m.name.clone(),
                    field: f.name.clone(),
                    reason: reason.to_string(),
                };
                match f.kind {
                    FieldKind::Char if f.max_length.unwrap_or(0) == 0 => {
                        return Err(invalid("char fields require max_length > 0"));
                    }
                    FieldKind::ForeignKey => {
                        let target = f.to.as_deref().ok_or_else(|| invalid("foreign key without target"))?;
                        if !model_names.contains(target) {
                            return Err(ConfigError::MissingReference {
                                kind: "model",
                                id: target.to_string(),
                            });
                        }
                    }
                    FieldKind::Auto if !f.primary_key => {
                        return Err(invalid("auto fields must be the primary key"));
                    }
                    FieldKind::File | FieldKind::Files if f.primary_key => {
                        return Err(invalid("file fields cannot be the primary key"));
                    }
                    _ => {}
                }
            }
            if pk_count > 1 {
                return Err(ConfigError::InvalidField {
                    model: m.name.clone(),
                    field: "primary_key".into(),
                    reason: "composite primary keys are not supported".into(),
                });
            }
            if pk_count == 0 && field_names.contains("id") {
                return Err(ConfigError::InvalidField {
                    model: m.name.clone(),
                    field: "id".into(),
                    reason: "'id' is reserved for the implicit primary key".into(),
                });
            }
        }
    }

    Ok(())
}
